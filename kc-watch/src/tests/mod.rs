mod pipeline_test;

use std::sync::Arc;
use std::time::Duration;

use futures::{
    StreamExt,
    stream,
};
use kc_core::prelude::*;
use kc_testutils::*;
use kube::api::WatchEvent;
use rstest::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use super::*;
use crate::list_watch::MockListWatch;

fn error_event(code: u16, reason: &str, message: &str) -> WatchEvent<DynamicObject> {
    serde_json::from_value(watch_error_event(code, reason, message)).unwrap()
}

fn watch_stream(events: Vec<WatchEvent<DynamicObject>>) -> WatchStream {
    stream::iter(events.into_iter().map(Ok)).boxed()
}

fn names(events: &[UpdateEvent]) -> Vec<String> {
    events.iter().map(|e| e.obj.name_any()).collect()
}
