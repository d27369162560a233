use std::sync::Arc;
use std::time::Duration;

use kc_core::errors::*;
use kc_core::k8s::{
    ResourceCatalog,
    build_client,
    discover_server_resources,
    get_resource_types,
};
use kc_core::prelude::*;
use kube::api::ApiResource;
use rand::Rng;
use tokio::sync::{
    mpsc,
    oneshot,
};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::batcher::EventBatcher;
use crate::client_handle::SharedClient;
use crate::config::CollectorConfig;
use crate::event::EventBatch;
use crate::handler::HandlerFactory;
use crate::list_watch::KubeListWatch;
use crate::state::PipelineState;
use crate::watchdog::Watchdog;
use crate::watcher::ResourceWatcher;

// One run of the watch pipeline: a watchdog, one watcher per resource type, and the batcher,
// all running under a token that is a child of the caller's.  The batch stream ending is the
// only signal the caller gets that the pipeline has stopped; when that happens the caller should
// shut this down and start a new one.
pub struct ClusterWatcher {
    batch_rx: mpsc::Receiver<EventBatch>,
    fetch_done_rx: Option<oneshot::Receiver<()>>,
    token: CancellationToken,
    state: Arc<PipelineState>,
    js: JoinSet<()>,
}

impl ClusterWatcher {
    pub async fn start(
        parent: &CancellationToken,
        config: &CollectorConfig,
        shared_client: Arc<SharedClient>,
        handlers: Arc<dyn HandlerFactory>,
    ) -> anyhow::Result<ClusterWatcher> {
        // Spread out reconnects when there are a lot of collectors pointed at the same cluster
        let max_delay_ms = config.max_rnd_conn_delay().as_millis() as u64;
        if max_delay_ms > 0 {
            let delay = Duration::from_millis(rand::rng().random_range(0..=max_delay_ms));
            info!("waiting {delay:?} before connecting to k8s server");
            tokio::select! {
                _ = tokio::time::sleep(delay) => (),
                _ = parent.cancelled() => bail!("cancelled before connecting to k8s server"),
            }
        }

        let client = build_client(&config.connection).await?;
        ClusterWatcher::start_with_client(parent, config, client, shared_client, handlers).await
    }

    pub async fn start_with_client(
        parent: &CancellationToken,
        config: &CollectorConfig,
        client: kube::Client,
        shared_client: Arc<SharedClient>,
        handlers: Arc<dyn HandlerFactory>,
    ) -> anyhow::Result<ClusterWatcher> {
        let version = client.apiserver_version().await?;
        info!("connected to k8s server, version {}", version.git_version);

        let resource_lists = discover_server_resources(&client).await?;
        let resource_types = get_resource_types(&resource_lists, &config.include_types, true);
        let catalog = ResourceCatalog::new(&resource_lists);
        if catalog.is_empty() {
            warn!("apiserver did not report any resources that can be listed and watched");
        }
        debug!("found {} list/watchable resources", catalog.len());

        shared_client.set(client.clone(), CancellationToken::new());

        // This has to be built before anything gets spawned; the annotation filter can't be
        // changed after this point
        let state = Arc::new(PipelineState::new(
            &config.annotation_filter,
            config.event_counts_log_interval().is_some(),
        ));

        let token = parent.child_token();
        let canary_ar = catalog
            .get(CANARY_RESOURCE)
            .cloned()
            .unwrap_or_else(|| ApiResource::erase::<corev1::Namespace>(&()));
        let canary = KubeListWatch::new(client.clone(), &canary_ar, Some(CANARY_FIELD_SELECTOR.into()));
        let watchdog = Watchdog::start(Box::new(canary), token.clone()).await?;

        let mut js = JoinSet::new();
        js.spawn(async move {
            watchdog.run().await;
        });

        let (evt_tx, evt_rx) = mpsc::channel(config.queue_len());
        let (ready_tx, ready_rx) = mpsc::channel(resource_types.len().max(1));
        let mut watched = 0;
        for resource in &resource_types {
            let Some(ar) = catalog.get(resource) else {
                debug!("{resource} can't be listed and watched, skipping");
                continue;
            };
            let Some(handler) = handlers.handler_for(resource, ar, state.clone()) else {
                debug!("no handler for {resource}, skipping");
                continue;
            };

            let lw = KubeListWatch::new(client.clone(), ar, handlers.field_selector_for(resource));
            let watcher =
                ResourceWatcher::new(resource, Box::new(lw), handler, evt_tx.clone(), state.clone(), ready_tx.clone());
            js.spawn(watcher.start(token.clone()));
            watched += 1;
        }
        info!("watching {watched} resource types");

        // The watchers hold the only remaining senders, so the batcher sees the channel close
        // once they've all exited
        drop(evt_tx);
        drop(ready_tx);

        let (fetch_done_tx, fetch_done_rx) = oneshot::channel();
        js.spawn(signal_fetch_done(ready_rx, watched, fetch_done_tx));

        let (batch_tx, batch_rx) = mpsc::channel(1);
        let batcher = EventBatcher::new(config.batch_max_size(), config.batch_tick_interval(), state.clone());
        js.spawn(batcher.run(token.clone(), evt_rx, batch_tx));

        if let Some(interval) = config.event_counts_log_interval() {
            js.spawn(log_event_counts(state.clone(), interval, token.clone()));
        }

        Ok(ClusterWatcher {
            batch_rx,
            fetch_done_rx: Some(fetch_done_rx),
            token,
            state,
            js,
        })
    }

    // Returns None once the pipeline has stopped
    pub async fn next_batch(&mut self) -> Option<EventBatch> {
        self.batch_rx.recv().await
    }

    // Resolves once every watched resource type has completed its first listing; if the
    // pipeline stops first, the receiver gets an error instead.
    pub fn take_fetch_done(&mut self) -> Option<oneshot::Receiver<()>> {
        self.fetch_done_rx.take()
    }

    pub async fn wait_fetch_done(&mut self) -> bool {
        match self.fetch_done_rx.take() {
            Some(rx) => rx.await.is_ok(),
            None => false,
        }
    }

    pub fn queue_depth(&self) -> u32 {
        self.state.queue_depth()
    }

    pub fn resource_ready(&self, resource: &str) -> bool {
        self.state.resource_ready(resource)
    }

    pub fn received_event(&self, resource: &str) -> bool {
        self.state.received_event(resource)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    // Cancels the pipeline and waits for everything to exit
    pub async fn shutdown(&mut self) {
        self.token.cancel();
        while let Some(res) = self.js.join_next().await {
            if let Err(err) = res
                && err.is_panic()
            {
                error!("pipeline task panicked: {err}");
            }
        }
        self.batch_rx.close();
        debug!("pipeline shut down");
    }
}

async fn signal_fetch_done(mut ready_rx: mpsc::Receiver<String>, expected: usize, fetch_done_tx: oneshot::Sender<()>) {
    for _ in 0..expected {
        match ready_rx.recv().await {
            Some(resource) => debug!("initial fetch of {resource} done"),
            None => return,
        }
    }
    info!("initial fetch of all {expected} resource types complete");
    let _ = fetch_done_tx.send(());
}

async fn log_event_counts(state: Arc<PipelineState>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => state.log_event_counts(),
            _ = token.cancelled() => break,
        }
    }
}
