use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kc_core::prelude::*;
use kube::api::WatchEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::event::UpdateEvent;
use crate::handler::EventHandler;
use crate::list_watch::ListWatch;
use crate::state::PipelineState;

enum WatchOutcome {
    // The server closed the watch; this happens routinely when the watch times out
    Closed,

    // Either the pipeline was cancelled or nobody is listening anymore
    Stopped,
}

// Keeps a single resource type under watch until the pipeline token is cancelled.  Each pass
// through the loop lists everything, forwards the listed objects as adds, and then watches from
// the list's resource version until the server hangs up on us, at which point we wait a bit and
// start over.  Watch timeouts are normal and are not treated as errors; the only exits are
// cancellation or the event channel going away.
pub struct ResourceWatcher {
    resource: String,
    lw: Box<dyn ListWatch>,
    handler: Box<dyn EventHandler>,
    evt_tx: mpsc::Sender<UpdateEvent>,
    state: Arc<PipelineState>,
    ready_tx: Option<mpsc::Sender<String>>,
    retry_delay: Duration,
}

impl ResourceWatcher {
    pub fn new(
        resource: &str,
        lw: Box<dyn ListWatch>,
        handler: Box<dyn EventHandler>,
        evt_tx: mpsc::Sender<UpdateEvent>,
        state: Arc<PipelineState>,
        ready_tx: mpsc::Sender<String>,
    ) -> ResourceWatcher {
        ResourceWatcher {
            resource: resource.into(),
            lw,
            handler,
            evt_tx,
            state,
            ready_tx: Some(ready_tx),
            retry_delay: Duration::from_secs(RETRY_DELAY_SECONDS),
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> ResourceWatcher {
        self.retry_delay = retry_delay;
        self
    }

    pub async fn start(mut self, token: CancellationToken) {
        debug!("starting watcher for {}", self.resource);
        loop {
            // If we were already cancelled going in, we make one last pass and then quit
            let terminated = token.is_cancelled();

            match self.list_then_watch(&token).await {
                Ok(WatchOutcome::Stopped) => break,
                Ok(WatchOutcome::Closed) => debug!("watch for {} closed by server", self.resource),
                Err(err) => warn!("watch for {} failed: {err}", self.resource),
            }

            if terminated || token.is_cancelled() {
                break;
            }

            debug!("restarting watch for {} in {:?}", self.resource, self.retry_delay);
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.retry_delay) => (),
            }
        }
        info!("watcher for {} exiting", self.resource);
    }

    async fn list_then_watch(&mut self, token: &CancellationToken) -> anyhow::Result<WatchOutcome> {
        let (objs, rv) = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(WatchOutcome::Stopped),
            res = self.lw.list() => res?,
        };

        if self.state.mark_started(&self.resource) {
            info!("initial listing of {} complete: {} objects", self.resource, objs.len());
        }
        for obj in objs {
            if !self.dispatch(WatchEvent::Added(obj), token).await {
                return Ok(WatchOutcome::Stopped);
            }
        }

        // Only the first successful listing counts towards the initial fetch
        if let Some(ready_tx) = self.ready_tx.take() {
            // the receiver goes away once everybody has checked in, which is fine
            let _ = ready_tx.send(self.resource.clone()).await;
        }

        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(WatchOutcome::Stopped),
            res = self.lw.watch(&rv) => res?,
        };

        loop {
            let maybe_evt = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(WatchOutcome::Stopped),
                evt = stream.next() => evt,
            };

            match maybe_evt {
                None => return Ok(WatchOutcome::Closed),
                Some(Err(err)) => return Err(err),
                Some(Ok(WatchEvent::Error(resp))) => {
                    warn!("received error event on {} watch: {resp}", self.resource);
                },
                Some(Ok(evt)) => {
                    if !self.dispatch(evt, token).await {
                        return Ok(WatchOutcome::Stopped);
                    }
                },
            }
        }
    }

    // The raw event channel is bounded, so this is where backpressure shows up; we need to
    // keep an eye on the token while we're blocked or shutdown can hang.  Returns false if the
    // watcher should stop.
    async fn dispatch(&mut self, evt: WatchEvent<DynamicObject>, token: &CancellationToken) -> bool {
        let Some(update) = self.handler.handle(evt) else {
            return true;
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            res = self.evt_tx.send(update) => {
                if res.is_err() {
                    debug!("event channel for {} closed", self.resource);
                }
                res.is_ok()
            },
        }
    }
}
