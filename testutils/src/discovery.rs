use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use serde_json::json;

use crate::constants::*;

const ALL_VERBS: &[&str] = &["create", "delete", "deletecollection", "get", "list", "patch", "update", "watch"];
const SUBRESOURCE_VERBS: &[&str] = &["get", "patch", "update"];

// Builds an APIResourceList directly, for tests that don't need to go through a fake apiserver;
// each entry is (name, kind), and everything is listable/watchable.
pub fn resource_list(group_version: &str, resources: &[(&str, &str)]) -> metav1::APIResourceList {
    metav1::APIResourceList {
        group_version: group_version.into(),
        resources: resources
            .iter()
            .map(|(name, kind)| metav1::APIResource {
                name: (*name).into(),
                kind: (*kind).into(),
                namespaced: true,
                singular_name: String::new(),
                verbs: ALL_VERBS.iter().map(|v| (*v).into()).collect(),
                ..Default::default()
            })
            .collect(),
    }
}

pub fn version_info() -> serde_json::Value {
    json!({
        "major": "1",
        "minor": "30",
        "gitVersion": TEST_SERVER_VERSION,
        "gitCommit": "39683505b630ff2121012f3c5b16215a1449d5ed",
        "gitTreeState": "clean",
        "buildDate": "2024-06-11T20:21:00Z",
        "goVersion": "go1.22.4",
        "compiler": "gc",
        "platform": "linux/amd64",
    })
}

pub fn core_api_versions() -> serde_json::Value {
    json!({
        "kind": "APIVersions",
        "versions": ["v1"],
        "serverAddressByClientCIDRs": [{"clientCIDR": "0.0.0.0/0", "serverAddress": "10.0.0.1:6443"}],
    })
}

pub fn api_group_list(groups: &[(&str, &str)]) -> serde_json::Value {
    let groups: Vec<_> = groups
        .iter()
        .map(|(name, version)| {
            let gv = json!({"groupVersion": format!("{name}/{version}"), "version": version});
            json!({"name": name, "versions": [gv.clone()], "preferredVersion": gv})
        })
        .collect();
    json!({"kind": "APIGroupList", "apiVersion": "v1", "groups": groups})
}

fn resource_json(name: &str, kind: &str, namespaced: bool, verbs: &[&str]) -> serde_json::Value {
    json!({
        "name": name,
        "singularName": if name.contains('/') { "" } else { name.trim_end_matches('s') },
        "namespaced": namespaced,
        "kind": kind,
        "verbs": verbs,
    })
}

pub fn core_v1_discovery() -> serde_json::Value {
    json!({
        "kind": "APIResourceList",
        "groupVersion": "v1",
        "resources": [
            resource_json("bindings", "Binding", true, &["create"]),
            resource_json("namespaces", "Namespace", false, ALL_VERBS),
            resource_json("namespaces/status", "Namespace", false, SUBRESOURCE_VERBS),
            resource_json("nodes", "Node", false, ALL_VERBS),
            resource_json("pods", "Pod", true, ALL_VERBS),
            resource_json("pods/status", "Pod", true, SUBRESOURCE_VERBS),
            resource_json("services", "Service", true, ALL_VERBS),
        ],
    })
}

pub fn apps_v1_discovery() -> serde_json::Value {
    json!({
        "kind": "APIResourceList",
        "apiVersion": "v1",
        "groupVersion": "apps/v1",
        "resources": [
            resource_json("daemonsets", "DaemonSet", true, ALL_VERBS),
            resource_json("daemonsets/status", "DaemonSet", true, SUBRESOURCE_VERBS),
            resource_json("deployments", "Deployment", true, ALL_VERBS),
            resource_json("deployments/scale", "Scale", true, SUBRESOURCE_VERBS),
            resource_json("deployments/status", "Deployment", true, SUBRESOURCE_VERBS),
        ],
    })
}
