use k8s_openapi::api::core::v1 as corev1;
use kube::api::{
    ApiResource,
    DynamicObject,
};
use rstest::fixture;
use serde_json::json;

use crate::constants::*;

#[fixture]
pub fn test_pod(#[default(TEST_POD)] name: &str) -> DynamicObject {
    DynamicObject::new(name, &ApiResource::erase::<corev1::Pod>(&()))
        .within(TEST_NAMESPACE)
        .data(json!({"spec": {"nodeName": TEST_NODE, "containers": [{"name": "nginx", "image": "nginx"}]}}))
}

#[fixture]
pub fn test_node(#[default(TEST_NODE)] name: &str) -> DynamicObject {
    DynamicObject::new(name, &ApiResource::erase::<corev1::Node>(&()))
        .data(json!({"spec": {"podCIDR": "10.244.0.0/24"}}))
}

#[fixture]
pub fn test_namespace(#[default(TEST_CANARY_NAMESPACE)] name: &str) -> DynamicObject {
    DynamicObject::new(name, &ApiResource::erase::<corev1::Namespace>(&()))
}

pub fn list_body(api_version: &str, kind: &str, items: &[DynamicObject], resource_version: &str) -> serde_json::Value {
    json!({
        "kind": format!("{kind}List"),
        "apiVersion": api_version,
        "metadata": {"resourceVersion": resource_version},
        "items": items,
    })
}

// Each event is (type, object), e.g. ("MODIFIED", &pod); the apiserver sends one JSON object per
// line on a watch connection
pub fn watch_body(events: &[(&str, &DynamicObject)]) -> String {
    events
        .iter()
        .map(|(type_, obj)| format!("{}\n", json!({"type": type_, "object": obj})))
        .collect()
}

pub fn watch_error_event(code: u16, reason: &str, message: &str) -> serde_json::Value {
    json!({
        "type": "ERROR",
        "object": {
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code,
        },
    })
}
