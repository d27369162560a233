use std::collections::HashMap;
use std::fs::File;
use std::time::Duration;

use kc_core::k8s::ConnectionConfig;
use kc_core::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::*;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectorConfig {
    #[serde(flatten)]
    pub connection: ConnectionConfig,

    // Upper bound (in seconds) on the random delay before connecting to the apiserver
    pub max_rnd_conn_delay: u64,

    pub queue_len: i64,
    pub batch_msgs_queue_len: i64,
    pub batch_msgs_tick_interval_ms: i64,

    // Resource types to watch even though they're disabled by default
    pub include_types: Vec<String>,
    pub annotation_filter: Vec<String>,

    // How often (in seconds) to log per-resource event counts; zero turns this off
    pub event_counts_log_time: u64,

    pub field_selectors: HashMap<String, String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            connection: Default::default(),
            max_rnd_conn_delay: 0,
            queue_len: DEFAULT_QUEUE_LEN,
            batch_msgs_queue_len: DEFAULT_BATCH_MSGS_QUEUE_LEN,
            batch_msgs_tick_interval_ms: DEFAULT_BATCH_MSGS_TICK_INTERVAL_MS,
            include_types: vec![],
            annotation_filter: vec![],
            event_counts_log_time: 0,
            field_selectors: HashMap::new(),
        }
    }
}

impl CollectorConfig {
    pub fn load(filename: &str) -> anyhow::Result<CollectorConfig> {
        Ok(serde_yaml::from_reader(File::open(filename)?)?)
    }

    // Out-of-range values are bumped up to 1 rather than rejected
    pub fn batch_max_size(&self) -> usize {
        at_least_one("batchMsgsQueueLen", self.batch_msgs_queue_len)
    }

    pub fn batch_tick_interval(&self) -> Duration {
        Duration::from_millis(at_least_one("batchMsgsTickIntervalMs", self.batch_msgs_tick_interval_ms) as u64)
    }

    pub fn queue_len(&self) -> usize {
        at_least_one("queueLen", self.queue_len)
    }

    pub fn max_rnd_conn_delay(&self) -> Duration {
        Duration::from_secs(self.max_rnd_conn_delay)
    }

    pub fn event_counts_log_interval(&self) -> Option<Duration> {
        (self.event_counts_log_time > 0).then(|| Duration::from_secs(self.event_counts_log_time))
    }
}

fn at_least_one(name: &str, value: i64) -> usize {
    if value < 1 {
        warn!("A value less than 1 entered for {name}: {value}. Setting the value to 1");
        return 1;
    }
    value as usize
}
