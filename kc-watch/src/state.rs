use std::collections::{
    BTreeMap,
    HashSet,
};
use std::sync::atomic::{
    AtomicU32,
    Ordering,
};
use std::sync::{
    Mutex,
    PoisonError,
    RwLock,
};

use kc_core::prelude::*;
use tracing::*;

use crate::event::UpdateAction;

// Per-run bookkeeping for one pipeline.  All of the mutable state in here is behind its own lock
// so that the resource watchers can update it concurrently; the annotation filter is frozen at
// construction time, since the watchers read it without synchronization.  A fresh PipelineState is
// built for every pipeline start, before any watcher is spawned.
#[derive(Debug, Default)]
pub struct PipelineState {
    started: ResourceSet,
    received: ResourceSet,
    annotation_filter: AnnotationFilter,
    counters: Option<Mutex<BTreeMap<String, EventCount>>>,
    queue_depth: AtomicU32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EventCount {
    pub added: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl PipelineState {
    pub fn new(annotation_filter: &[String], count_events: bool) -> PipelineState {
        PipelineState {
            annotation_filter: AnnotationFilter::new(annotation_filter),
            counters: count_events.then(Default::default),
            ..Default::default()
        }
    }

    // A resource is "started" once its watcher has successfully listed it at least once;
    // this does not mean the watch itself is still healthy.
    pub fn mark_started(&self, resource: &str) -> bool {
        self.started.insert(resource)
    }

    pub fn resource_ready(&self, resource: &str) -> bool {
        self.started.contains(resource)
    }

    pub fn mark_received(&self, resource: &str) {
        // Checking first means we only take the write lock once per resource
        if !self.received.contains(resource) {
            self.received.insert(resource);
        }
    }

    pub fn received_event(&self, resource: &str) -> bool {
        self.received.contains(resource)
    }

    pub fn annotation_filter(&self) -> &AnnotationFilter {
        &self.annotation_filter
    }

    pub fn record_event(&self, resource: &str, action: UpdateAction) {
        let Some(counters) = &self.counters else { return };
        let mut counters = counters.lock().unwrap_or_else(PoisonError::into_inner);
        let count = counters.entry(resource.into()).or_default();
        match action {
            UpdateAction::Added => count.added += 1,
            UpdateAction::Updated => count.updated += 1,
            UpdateAction::Deleted => count.deleted += 1,
        }
    }

    pub fn event_counts(&self) -> BTreeMap<String, EventCount> {
        match &self.counters {
            Some(counters) => counters.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            None => BTreeMap::new(),
        }
    }

    pub fn log_event_counts(&self) {
        for (resource, count) in self.event_counts() {
            info!(
                "{resource} events: {} adds, {} updates, {} deletes",
                count.added, count.updated, count.deleted
            );
        }
    }

    // The queue depth is purely diagnostic, so nobody needs a consistent view of it
    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth as u32, Ordering::Relaxed);
    }

    pub fn queue_depth(&self) -> u32 {
        self.queue_depth.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct ResourceSet(RwLock<HashSet<String>>);

impl ResourceSet {
    fn insert(&self, resource: &str) -> bool {
        self.0.write().unwrap_or_else(PoisonError::into_inner).insert(resource.into())
    }

    fn contains(&self, resource: &str) -> bool {
        self.0.read().unwrap_or_else(PoisonError::into_inner).contains(resource)
    }
}

// The allow-list holds fully-qualified tag names, e.g. "kubernetes.pod.annotation.owner"; an
// empty allow-list means no annotations are forwarded at all.
#[derive(Clone, Debug, Default)]
pub struct AnnotationFilter {
    allowed: HashSet<String>,
}

impl AnnotationFilter {
    pub fn new(annotations: &[String]) -> AnnotationFilter {
        AnnotationFilter { allowed: annotations.iter().cloned().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn filter(&self, meta: &metav1::ObjectMeta, prefix: &str) -> Option<BTreeMap<String, String>> {
        if self.is_empty() {
            return None;
        }

        let tags: BTreeMap<_, _> = meta
            .annotations
            .iter()
            .flatten()
            .filter_map(|(k, v)| {
                let tag = format!("{prefix}annotation.{k}");
                self.allowed.contains(&tag).then(|| (tag, v.clone()))
            })
            .collect();

        (!tags.is_empty()).then_some(tags)
    }
}
