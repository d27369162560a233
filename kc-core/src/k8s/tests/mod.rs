
use kc_testutils::*;
use rstest::*;
use tracing_test::traced_test;

use super::*;
use crate::prelude::*;

#[rstest]
fn test_namespaced_name(test_pod: DynamicObject) {
    assert_eq!(test_pod.namespaced_name(), format!("{TEST_NAMESPACE}/{TEST_POD}"));
}

#[rstest]
fn test_namespaced_name_cluster_scoped(test_node: DynamicObject) {
    assert_eq!(test_node.namespaced_name(), TEST_NODE);
}
