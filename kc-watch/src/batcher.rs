use std::mem;
use std::sync::Arc;
use std::time::Duration;

use metrics::{
    counter,
    gauge,
};
use tokio::sync::mpsc;
use tokio::time::{
    Instant,
    MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::event::{
    EventBatch,
    UpdateEvent,
};
use crate::state::PipelineState;

const BATCH_QUEUE_DEPTH_GAUGE: &str = "kc_batch_queue_depth";
const BATCHES_EMITTED_COUNTER: &str = "kc_batches_emitted_total";

// Batches are allowed to grow past this, we just don't reserve more than this much up front
const MAX_PREALLOCATED_EVENTS: usize = 1024;

// Anything longer than this is effectively "never", and keeps the ticker deadline arithmetic
// from overflowing
const MAX_TICK_INTERVAL: Duration = Duration::from_secs(86400 * 365);

// The batcher is the only reader of the raw event channel and the only writer of the batch
// channel.  Events are accumulated until either the batch is full or the ticker fires with a
// non-empty batch, and then the batch is handed off downstream.  The batch channel is expected
// to have capacity 1, so there is at most one batch waiting on the consumer at any time.
pub struct EventBatcher {
    max_size: usize,
    tick_interval: Duration,
    state: Arc<PipelineState>,
}

impl EventBatcher {
    pub fn new(max_size: usize, tick_interval: Duration, state: Arc<PipelineState>) -> EventBatcher {
        EventBatcher {
            max_size: max_size.max(1),
            tick_interval: tick_interval.clamp(Duration::from_millis(1), MAX_TICK_INTERVAL),
            state,
        }
    }

    pub async fn run(
        self,
        token: CancellationToken,
        mut evt_rx: mpsc::Receiver<UpdateEvent>,
        batch_tx: mpsc::Sender<EventBatch>,
    ) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut batch = self.empty_batch();
        loop {
            let mut flush_due = false;
            tokio::select! {
                maybe_evt = evt_rx.recv() => match maybe_evt {
                    Some(evt) => batch.push(evt),
                    None => {
                        debug!("raw event channel closed");
                        break;
                    },
                },
                _ = ticker.tick() => flush_due = true,
                _ = token.cancelled() => break,
            }

            if batch.len() >= self.max_size || (flush_due && !batch.is_empty()) {
                let full = mem::replace(&mut batch, self.empty_batch());
                tokio::select! {
                    res = batch_tx.send(full) => {
                        if res.is_err() {
                            debug!("batch receiver went away");
                            break;
                        }
                        counter!(BATCHES_EMITTED_COUNTER).increment(1);
                    },
                    _ = token.cancelled() => break,
                }
            }

            self.state.set_queue_depth(batch.len());
            gauge!(BATCH_QUEUE_DEPTH_GAUGE).set(batch.len() as f64);
        }

        // Watchers may be blocked trying to send to us; they can't see the cancellation until
        // they're unblocked.  Whatever hasn't been flushed yet is dropped.
        let drained = drain_channel(&mut evt_rx).await;
        info!("event batcher exiting, dropped {} unsent events", drained + batch.len());
        self.state.set_queue_depth(0);
        drop(batch_tx);
    }

    fn empty_batch(&self) -> EventBatch {
        EventBatch::with_capacity(self.max_size.min(MAX_PREALLOCATED_EVENTS))
    }
}

// Closes the channel and throws away everything still in it, returning how many items were
// thrown away.  Senders that were waiting on capacity get an error.
pub async fn drain_channel<T>(rx: &mut mpsc::Receiver<T>) -> usize {
    rx.close();
    let mut drained = 0;
    while rx.recv().await.is_some() {
        drained += 1;
    }
    if drained > 0 {
        debug!("drained {drained} items from closed channel");
    }
    drained
}
