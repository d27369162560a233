use std::collections::HashMap;
use std::sync::Arc;

use clockabilly::{
    Clockable,
    UtcClock,
};
use kc_core::prelude::*;
use kube::api::{
    ApiResource,
    WatchEvent,
};

use crate::event::{
    UpdateAction,
    UpdateEvent,
};
use crate::state::PipelineState;

// Turns raw watch events for a single resource type into the events we forward downstream.
// Returning None drops the event.
pub trait EventHandler: Send {
    fn handle(&mut self, evt: WatchEvent<DynamicObject>) -> Option<UpdateEvent>;
}

pub trait HandlerFactory: Send + Sync {
    // Returning None means that the resource type isn't watched at all
    fn handler_for(
        &self,
        resource: &str,
        ar: &ApiResource,
        state: Arc<PipelineState>,
    ) -> Option<Box<dyn EventHandler>>;

    fn field_selector_for(&self, _resource: &str) -> Option<String> {
        None
    }
}

pub struct DynObjHandler {
    resource: String,
    tag_prefix: String,
    state: Arc<PipelineState>,
    clock: Box<dyn Clockable + Send>,
}

impl DynObjHandler {
    pub fn new(resource: &str, ar: &ApiResource, state: Arc<PipelineState>) -> DynObjHandler {
        DynObjHandler::new_with_clock(resource, ar, state, Box::new(UtcClock))
    }

    pub fn new_with_clock(
        resource: &str,
        ar: &ApiResource,
        state: Arc<PipelineState>,
        clock: Box<dyn Clockable + Send>,
    ) -> DynObjHandler {
        DynObjHandler {
            resource: resource.into(),
            tag_prefix: format!("{TAG_PREFIX}.{}.", ar.kind.to_lowercase()),
            state,
            clock,
        }
    }
}

impl EventHandler for DynObjHandler {
    fn handle(&mut self, evt: WatchEvent<DynamicObject>) -> Option<UpdateEvent> {
        let (action, mut obj) = match evt {
            WatchEvent::Added(obj) => (UpdateAction::Added, obj),
            WatchEvent::Modified(obj) => (UpdateAction::Updated, obj),
            WatchEvent::Deleted(obj) => (UpdateAction::Deleted, obj),
            WatchEvent::Bookmark(_) | WatchEvent::Error(_) => return None,
        };

        // managed fields are large and nobody downstream looks at them
        obj.metadata.managed_fields = None;

        self.state.mark_received(&self.resource);
        self.state.record_event(&self.resource, action);

        let annotations = self.state.annotation_filter().filter(&obj.metadata, &self.tag_prefix);
        Some(UpdateEvent {
            action,
            resource: self.resource.clone(),
            ts: self.clock.now_ts(),
            obj,
            annotations,
        })
    }
}

// The default factory: every discovered resource type gets a DynObjHandler, and field selectors
// come straight out of the collector config.
#[derive(Clone, Debug, Default)]
pub struct DynObjHandlerFactory {
    field_selectors: HashMap<String, String>,
}

impl DynObjHandlerFactory {
    pub fn new(field_selectors: HashMap<String, String>) -> DynObjHandlerFactory {
        DynObjHandlerFactory { field_selectors }
    }
}

impl HandlerFactory for DynObjHandlerFactory {
    fn handler_for(
        &self,
        resource: &str,
        ar: &ApiResource,
        state: Arc<PipelineState>,
    ) -> Option<Box<dyn EventHandler>> {
        Some(Box::new(DynObjHandler::new(resource, ar, state)))
    }

    fn field_selector_for(&self, resource: &str) -> Option<String> {
        self.field_selectors.get(resource).cloned()
    }
}
