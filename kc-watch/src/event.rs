use std::collections::BTreeMap;

use kc_core::prelude::*;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateAction {
    Added,
    Updated,
    Deleted,
}

// A single change notification for one object; these are moved into a batch once they've been
// queued and never touched again.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    pub action: UpdateAction,
    pub resource: String,
    pub ts: i64,
    pub obj: DynamicObject,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventBatch {
    events: Vec<UpdateEvent>,
}

impl EventBatch {
    pub fn with_capacity(capacity: usize) -> EventBatch {
        EventBatch { events: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, evt: UpdateEvent) {
        self.events.push(evt);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[UpdateEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<UpdateEvent> {
        self.events
    }
}
