use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{
    StreamExt,
    TryStreamExt,
};
use kc_core::prelude::*;
use kube::api::{
    Api,
    ApiResource,
    ListParams,
    WatchEvent,
    WatchParams,
};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use tracing::*;

pub type WatchStream = BoxStream<'static, anyhow::Result<WatchEvent<DynamicObject>>>;

// The list-then-watch seam: everything that talks to the apiserver for a single resource type
// goes through here, so that the watcher and watchdog loops can be tested without a cluster.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait ListWatch: Send + Sync {
    // Returns every object of the resource type along with the resource version the watch
    // should resume from
    async fn list(&self) -> anyhow::Result<(Vec<DynamicObject>, String)>;

    async fn watch(&self, resource_version: &str) -> anyhow::Result<WatchStream>;
}

#[derive(Clone)]
pub struct KubeListWatch {
    api: Api<DynamicObject>,
    field_selector: Option<String>,
}

impl KubeListWatch {
    // Watches are always cluster-wide
    pub fn new(client: kube::Client, ar: &ApiResource, field_selector: Option<String>) -> KubeListWatch {
        KubeListWatch { api: Api::all_with(client, ar), field_selector }
    }
}

#[async_trait]
impl ListWatch for KubeListWatch {
    async fn list(&self) -> anyhow::Result<(Vec<DynamicObject>, String)> {
        let mut objs = vec![];
        let mut continue_token: Option<String> = None;
        loop {
            let mut lp = ListParams::default().limit(LIST_PAGE_SIZE);
            if let Some(fs) = &self.field_selector {
                lp = lp.fields(fs);
            }
            if let Some(token) = &continue_token {
                lp = lp.continue_token(token);
            }

            let page = self.api.list(&lp).await?;
            objs.extend(page.items);

            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => {
                    let rv = page.metadata.resource_version.unwrap_or_default();
                    debug!("listed {} objects at resource version {rv}", objs.len());
                    return Ok((objs, rv));
                },
            }
        }
    }

    async fn watch(&self, resource_version: &str) -> anyhow::Result<WatchStream> {
        let mut wp = WatchParams::default().timeout(WATCH_TIMEOUT_SECONDS);
        if let Some(fs) = &self.field_selector {
            wp = wp.fields(fs);
        }

        let stream = self.api.watch(&wp, resource_version).await?;
        Ok(stream.map_err(anyhow::Error::from).boxed())
    }
}
