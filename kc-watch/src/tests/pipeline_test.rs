use httpmock::prelude::*;

use super::*;

const WATCH_DELAY: Duration = Duration::from_millis(200);

fn handle_discovery(fake_apiserver: &mut MockServerBuilder) {
    fake_apiserver
        .handle(|when, then| {
            when.method(GET).path("/version");
            then.json_body(version_info());
        })
        .handle(|when, then| {
            when.method(GET).path("/api");
            then.json_body(core_api_versions());
        })
        .handle(|when, then| {
            when.method(GET).path("/api/v1");
            then.json_body(core_v1_discovery());
        })
        .handle(|when, then| {
            when.method(GET).path("/apis");
            then.json_body(api_group_list(&[("apps", "v1")]));
        })
        .handle(|when, then| {
            when.method(GET).path("/apis/apps/v1");
            then.json_body(apps_v1_discovery());
        });
}

fn test_config() -> CollectorConfig {
    CollectorConfig {
        batch_msgs_queue_len: 100,
        batch_msgs_tick_interval_ms: 20,
        ..Default::default()
    }
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn test_cluster_watcher_end_to_end(
    test_namespace: DynamicObject,
    test_node: DynamicObject,
    test_pod: DynamicObject,
) {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    handle_discovery(&mut fake_apiserver);

    // The canary and the namespace watcher both hit these
    fake_apiserver
        .handle_list("/api/v1/namespaces", list_body("v1", "Namespace", &[test_namespace], "1"))
        .handle_watch("/api/v1/namespaces", String::new(), WATCH_DELAY)
        .handle_list("/api/v1/nodes", list_body("v1", "Node", &[test_node], "1"))
        .handle_watch("/api/v1/nodes", String::new(), WATCH_DELAY)
        .handle_list("/apis/apps/v1/daemonsets", list_body("apps/v1", "DaemonSet", &[], "1"))
        .handle_watch("/apis/apps/v1/daemonsets", String::new(), WATCH_DELAY)
        .handle_list("/apis/apps/v1/deployments", list_body("apps/v1", "Deployment", &[], "1"))
        .handle_watch("/apis/apps/v1/deployments", String::new(), WATCH_DELAY)
        .handle_list("/api/v1/pods", list_body("v1", "Pod", &[test_pod.clone()], "1"))
        .handle_watch("/api/v1/pods", watch_body(&[("MODIFIED", &test_pod)]), WATCH_DELAY)
        .build();

    let token = CancellationToken::new();
    let shared_client = Arc::new(SharedClient::new());
    let handlers = Arc::new(DynObjHandlerFactory::default());

    let run = async {
        let mut cw = ClusterWatcher::start_with_client(&token, &test_config(), client, shared_client.clone(), handlers)
            .await
            .unwrap();
        assert!(cw.wait_fetch_done().await);
        for resource in [NAMESPACES_RESOURCE, NODES_RESOURCE, PODS_RESOURCE, "daemonsets", "deployments"] {
            assert!(cw.resource_ready(resource));
        }

        let mut events = vec![];
        while !events.iter().any(|e: &UpdateEvent| e.action == UpdateAction::Updated) {
            let batch = cw.next_batch().await.unwrap();
            events.extend(batch.into_events());
        }

        let added: Vec<_> = events
            .iter()
            .filter(|e| e.action == UpdateAction::Added)
            .map(|e| (e.resource.as_str(), e.obj.name_any()))
            .collect();
        assert!(added.contains(&(NAMESPACES_RESOURCE, TEST_CANARY_NAMESPACE.into())));
        assert!(added.contains(&(NODES_RESOURCE, TEST_NODE.into())));
        assert!(added.contains(&(PODS_RESOURCE, TEST_POD.into())));
        assert!(cw.received_event(PODS_RESOURCE));
        assert!(!cw.received_event("daemonsets"));
        assert!(shared_client.get().is_some());

        // Cancelling the caller's token stops everything and closes the batch stream
        token.cancel();
        while cw.next_batch().await.is_some() {}
        cw.shutdown().await;
    };
    tokio::time::timeout(Duration::from_secs(10), run).await.unwrap();

    // Most of the endpoints get hit more than once, so there's no fake_apiserver.assert() here
    assert!(logs_contain(&format!("connected to k8s server, version {TEST_SERVER_VERSION}")));
    assert!(logs_contain("initial fetch of all 5 resource types complete"));
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn test_cluster_watcher_watchdog_error_closes_stream(test_namespace: DynamicObject, test_pod: DynamicObject) {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    handle_discovery(&mut fake_apiserver);

    // The namespace watcher just logs the error event and carries on, but the canary shares the
    // endpoint and takes the whole pipeline down
    let error_body = format!("{}\n", watch_error_event(500, "InternalError", "etcdserver: leader changed"));
    fake_apiserver
        .handle_list("/api/v1/namespaces", list_body("v1", "Namespace", &[test_namespace], "1"))
        .handle_watch("/api/v1/namespaces", error_body, Duration::from_millis(50))
        .handle_list("/api/v1/nodes", list_body("v1", "Node", &[], "1"))
        .handle_watch("/api/v1/nodes", String::new(), WATCH_DELAY)
        .handle_list("/apis/apps/v1/daemonsets", list_body("apps/v1", "DaemonSet", &[], "1"))
        .handle_watch("/apis/apps/v1/daemonsets", String::new(), WATCH_DELAY)
        .handle_list("/apis/apps/v1/deployments", list_body("apps/v1", "Deployment", &[], "1"))
        .handle_watch("/apis/apps/v1/deployments", String::new(), WATCH_DELAY)
        .handle_list("/api/v1/pods", list_body("v1", "Pod", &[test_pod], "1"))
        .handle_watch("/api/v1/pods", String::new(), WATCH_DELAY)
        .build();

    let token = CancellationToken::new();
    let handlers = Arc::new(DynObjHandlerFactory::default());

    let run = async {
        let mut cw =
            ClusterWatcher::start_with_client(&token, &test_config(), client, Arc::new(SharedClient::new()), handlers)
                .await
                .unwrap();

        // Whatever got batched before the error may still come through, but the stream has to end
        while cw.next_batch().await.is_some() {}
        assert!(cw.is_cancelled());
        cw.shutdown().await;
    };
    tokio::time::timeout(Duration::from_secs(10), run).await.unwrap();

    assert!(!token.is_cancelled());
    assert!(logs_contain("k8s watchdog received error event, stopping pipeline"));
    assert!(logs_contain("k8s watchdog exiting"));
}

#[rstest]
#[traced_test]
#[tokio::test]
async fn test_cluster_watcher_watchdog_setup_fails() {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    handle_discovery(&mut fake_apiserver);
    fake_apiserver
        .handle(|when, then| {
            when.method(GET)
                .path("/api/v1/namespaces")
                .query_param("fieldSelector", CANARY_FIELD_SELECTOR);
            then.status(403).json_body(status_forbidden());
        })
        .build();

    let token = CancellationToken::new();
    let res = ClusterWatcher::start_with_client(
        &token,
        &test_config(),
        client,
        Arc::new(SharedClient::new()),
        Arc::new(DynObjHandlerFactory::default()),
    )
    .await;

    fake_apiserver.assert();
    assert!(res.is_err());
    assert!(!token.is_cancelled());
    assert!(logs_contain("unable to start k8s watchdog"));
}

#[rstest]
#[tokio::test]
async fn test_cluster_watcher_version_probe_fails() {
    let (mut fake_apiserver, client) = make_fake_apiserver();
    fake_apiserver
        .handle(|when, then| {
            when.method(GET).path("/version");
            then.status(503).json_body(status_unavailable());
        })
        .build();

    let shared_client = Arc::new(SharedClient::new());
    let res = ClusterWatcher::start_with_client(
        &CancellationToken::new(),
        &test_config(),
        client,
        shared_client.clone(),
        Arc::new(DynObjHandlerFactory::default()),
    )
    .await;

    fake_apiserver.assert();
    assert!(res.is_err());
    assert!(shared_client.get().is_none());
}
