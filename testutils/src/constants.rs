pub const TEST_NAMESPACE: &str = "test-namespace";
pub const TEST_NODE: &str = "the-node";
pub const TEST_POD: &str = "the-pod";
pub const TEST_CANARY_NAMESPACE: &str = "default";
pub const TEST_SERVER_VERSION: &str = "v1.30.2";
