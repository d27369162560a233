#![cfg_attr(coverage, feature(coverage_attribute))]
mod batcher;
mod client_handle;
mod config;
mod event;
mod handler;
mod list_watch;
mod pipeline;
mod state;
mod watchdog;
mod watcher;

pub use crate::batcher::{
    EventBatcher,
    drain_channel,
};
pub use crate::client_handle::SharedClient;
pub use crate::config::CollectorConfig;
pub use crate::event::{
    EventBatch,
    UpdateAction,
    UpdateEvent,
};
pub use crate::handler::{
    DynObjHandler,
    DynObjHandlerFactory,
    EventHandler,
    HandlerFactory,
};
#[cfg(feature = "mock")]
pub use crate::list_watch::MockListWatch;
pub use crate::list_watch::{
    KubeListWatch,
    ListWatch,
    WatchStream,
};
pub use crate::pipeline::ClusterWatcher;
pub use crate::state::{
    AnnotationFilter,
    EventCount,
    PipelineState,
};
pub use crate::watchdog::{
    Watchdog,
    WatchdogExit,
};
pub use crate::watcher::ResourceWatcher;

#[cfg(test)]
mod tests;
