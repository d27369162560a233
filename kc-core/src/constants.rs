// Well-known resource kinds
pub const NODES_RESOURCE: &str = "nodes";
pub const NAMESPACES_RESOURCE: &str = "namespaces";
pub const PODS_RESOURCE: &str = "pods";
pub const CRONJOBS_RESOURCE: &str = "cronjobs";

// Only the beta cronjob API is understood by downstream consumers
pub const CRONJOB_GROUP_VERSION: &str = "batch/v1beta1";

// Resource kinds that are not watched unless they're explicitly re-included; PVCs may depend on
// PVs, so if you include one you probably want the other as well.
pub const DEFAULT_DISABLED_RESOURCES: &[&str] = &[
    "horizontalpodautoscalers",
    "persistentvolumeclaims",
    "persistentvolumes",
    "resourcequotas",
    "services",
];

// The watchdog watches a single, cheap, always-present object to detect apiserver outages
pub const CANARY_RESOURCE: &str = NAMESPACES_RESOURCE;
pub const CANARY_FIELD_SELECTOR: &str = "metadata.name=default";

// Prefix for annotation tags, e.g. "kubernetes.pod.annotation.foo"
pub const TAG_PREFIX: &str = "kubernetes";

// Timing
pub const RETRY_DELAY_SECONDS: u64 = 5;
pub const ERROR_RETRY_DELAY_SECONDS: u64 = 30;
pub const WATCH_TIMEOUT_SECONDS: u32 = 290;

// Paging
pub const LIST_PAGE_SIZE: u32 = 500;

// Defaults for collector configuration
pub const DEFAULT_QUEUE_LEN: i64 = 1000;
pub const DEFAULT_BATCH_MSGS_QUEUE_LEN: i64 = 100;
pub const DEFAULT_BATCH_MSGS_TICK_INTERVAL_MS: i64 = 100;
