use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use kube::api::{
    ApiResource,
    GroupVersionKind,
};
use tracing::*;

use super::KubernetesError;
use crate::prelude::*;

// Returns the names of all the resource types we should watch, in the order they should be
// started: nodes and namespaces come first, since most other objects refer to them, and pods come
// last, since pods refer to pretty much everything else.  Resources that appear in multiple group
// versions are only returned once.
//
// Resources in DEFAULT_DISABLED_RESOURCES are skipped unless they are listed in include_types;
// pass check_include = false to get everything the server knows about.
pub fn get_resource_types(
    resources: &[metav1::APIResourceList],
    include_types: &[String],
    check_include: bool,
) -> Vec<String> {
    let mut resource_types: Vec<String> = vec![];
    let mut have_pods = false;

    for resource_list in resources {
        for resource in &resource_list.resources {
            debug!(
                "k8s API server supports {}/{}: {}",
                resource_list.group_version,
                resource.name,
                resource.verbs.join(",")
            );

            // subresources (pods/status, deployments/scale, ...) aren't independently watchable
            if resource.name.contains('/') {
                continue;
            }

            if resource.name == CRONJOBS_RESOURCE && resource_list.group_version != CRONJOB_GROUP_VERSION {
                continue;
            }

            if check_include && is_default_disabled(&resource.name) && !include_types.contains(&resource.name) {
                debug!("excluding resource type {}", resource.name);
                continue;
            }

            if resource_types.contains(&resource.name) || (resource.name == PODS_RESOURCE && have_pods) {
                continue;
            }

            if resource.name == NODES_RESOURCE || resource.name == NAMESPACES_RESOURCE {
                resource_types.insert(0, resource.name.clone());
            } else if resource.name == PODS_RESOURCE {
                have_pods = true;
            } else {
                resource_types.push(resource.name.clone());
            }
        }
    }

    if have_pods {
        resource_types.push(PODS_RESOURCE.into());
    }

    resource_types
}

fn is_default_disabled(name: &str) -> bool {
    DEFAULT_DISABLED_RESOURCES.contains(&name)
}

// Queries the core API and every group version the server advertises.  Failing to list the
// core versions or the API groups themselves is fatal; failing to list the resources in an
// individual group version (this happens a lot with aggregated APIs like metrics-server) is
// tolerated as long as we found _something_.
pub async fn discover_server_resources(client: &kube::Client) -> anyhow::Result<Vec<metav1::APIResourceList>> {
    let mut resources = vec![];
    let mut failures = vec![];

    let core_versions = client.list_core_api_versions().await?;
    for version in &core_versions.versions {
        match client.list_core_api_resources(version).await {
            Ok(list) => resources.push(list),
            Err(err) => failures.push((version.clone(), err)),
        }
    }

    let groups = client.list_api_groups().await?;
    for group in &groups.groups {
        for gv in &group.versions {
            match client.list_api_group_resources(&gv.group_version).await {
                Ok(list) => resources.push(list),
                Err(err) => failures.push((gv.group_version.clone(), err)),
            }
        }
    }

    tolerate_partial_discovery(resources, failures)
}

pub(super) fn tolerate_partial_discovery<E: fmt::Display>(
    resources: Vec<metav1::APIResourceList>,
    failures: Vec<(String, E)>,
) -> anyhow::Result<Vec<metav1::APIResourceList>> {
    if failures.is_empty() {
        return Ok(resources);
    }

    for (gv, err) in &failures {
        info!("k8s server returned [{err}] during resource discovery for {gv}");
    }

    let failed_gvs: Vec<_> = failures.iter().map(|(gv, _)| gv.as_str()).collect();
    if resources.iter().all(|rl| rl.resources.is_empty()) {
        return Err(KubernetesError::group_discovery_failed(&failed_gvs.join(", ")));
    }

    info!(
        "continuing k8s setup with the resources that were discovered: {:?}",
        get_resource_types(&resources, &[], false)
    );
    Ok(resources)
}

// The discovery lists only give us names; to actually build a list/watch client for a resource
// type we need its group, version, and kind.  The catalog holds the first watchable group version
// we saw for each resource name, which (since the core API is listed first) prefers v1 over
// the various aliased groups.
#[derive(Clone, Debug, Default)]
pub struct ResourceCatalog {
    resources: HashMap<String, ApiResource>,
}

impl ResourceCatalog {
    pub fn new(lists: &[metav1::APIResourceList]) -> ResourceCatalog {
        let mut resources = HashMap::new();
        for resource_list in lists {
            let (group, version) = split_group_version(&resource_list.group_version);
            for resource in &resource_list.resources {
                if resource.name.contains('/') || !is_watchable(resource) {
                    continue;
                }
                if resource.name == CRONJOBS_RESOURCE && resource_list.group_version != CRONJOB_GROUP_VERSION {
                    continue;
                }

                if let Entry::Vacant(e) = resources.entry(resource.name.clone()) {
                    let gvk = GroupVersionKind::gvk(group, version, &resource.kind);
                    e.insert(ApiResource::from_gvk_with_plural(&gvk, &resource.name));
                }
            }
        }
        ResourceCatalog { resources }
    }

    pub fn get(&self, name: &str) -> Option<&ApiResource> {
        self.resources.get(name)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn is_watchable(resource: &metav1::APIResource) -> bool {
    let has_verb = |v: &str| resource.verbs.iter().any(|verb| verb == v);
    has_verb("list") && has_verb("watch")
}

// "apps/v1" -> ("apps", "v1"), "v1" -> ("", "v1")
pub fn split_group_version(group_version: &str) -> (&str, &str) {
    match group_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", group_version),
    }
}
