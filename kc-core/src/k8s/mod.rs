mod client;
mod discovery;

pub use client::*;
pub use discovery::*;
use kube::ResourceExt;

use crate::errors::*;

err_impl! {KubernetesError,
    #[error("could not discover resources for group version(s): {0}")]
    GroupDiscoveryFailed(String),
}

pub trait KubeResourceExt {
    fn namespaced_name(&self) -> String;
}

impl<T: ResourceExt> KubeResourceExt for T {
    fn namespaced_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}", ns, self.name_any()),
            None => self.name_any(),
        }
    }
}

#[cfg(test)]
mod tests;
