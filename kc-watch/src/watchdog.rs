use futures::StreamExt;
use kube::api::WatchEvent;
use tokio_util::sync::CancellationToken;
use tracing::*;

use crate::list_watch::{
    ListWatch,
    WatchStream,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WatchdogExit {
    // Somebody else cancelled the pipeline
    Cancelled,

    // The apiserver sent us an error event on the canary watch
    WatchError,

    // The canary watch was closed and could not be re-established
    ReconnectFailed,
}

enum WatchdogState {
    Watching(WatchStream),
    Reconnecting,
    Stopped(WatchdogExit),
}

// An individual resource watch going away doesn't tell us anything about the health of the
// apiserver, so the watchdog keeps its own watch open on a single cheap object.  A watch timeout
// is routine and we just reconnect; an error on the watch, or failing to reconnect, means that
// something is actually wrong, and we tear the whole pipeline down by cancelling its token.
pub struct Watchdog {
    lw: Box<dyn ListWatch>,
    token: CancellationToken,
    stream: WatchStream,
}

impl Watchdog {
    // The initial connection is made synchronously so that the caller can refuse to start the
    // pipeline if the apiserver isn't answering.
    pub async fn start(lw: Box<dyn ListWatch>, token: CancellationToken) -> anyhow::Result<Watchdog> {
        match connect(lw.as_ref()).await {
            Ok(stream) => {
                info!("k8s watchdog started");
                Ok(Watchdog { lw, token, stream })
            },
            Err(err) => {
                error!("unable to start k8s watchdog: {err}");
                Err(err)
            },
        }
    }

    pub async fn run(self) -> WatchdogExit {
        let Watchdog { lw, token, stream } = self;
        let mut state = WatchdogState::Watching(stream);

        let exit = loop {
            state = match state {
                WatchdogState::Watching(mut stream) => tokio::select! {
                    _ = token.cancelled() => WatchdogState::Stopped(WatchdogExit::Cancelled),
                    maybe_evt = stream.next() => match maybe_evt {
                        None => {
                            debug!("k8s watchdog watch closed, reconnecting");
                            WatchdogState::Reconnecting
                        },
                        Some(Err(err)) => {
                            warn!("k8s watchdog watch failed, reconnecting: {err}");
                            WatchdogState::Reconnecting
                        },
                        Some(Ok(WatchEvent::Error(resp))) => {
                            error!("k8s watchdog received error event, stopping pipeline: {resp}");
                            token.cancel();
                            WatchdogState::Stopped(WatchdogExit::WatchError)
                        },
                        Some(Ok(_)) => WatchdogState::Watching(stream),
                    },
                },
                WatchdogState::Reconnecting => tokio::select! {
                    _ = token.cancelled() => WatchdogState::Stopped(WatchdogExit::Cancelled),
                    res = connect(lw.as_ref()) => match res {
                        Ok(stream) => WatchdogState::Watching(stream),
                        Err(err) => {
                            error!("k8s watchdog could not reconnect, stopping pipeline: {err}");
                            token.cancel();
                            WatchdogState::Stopped(WatchdogExit::ReconnectFailed)
                        },
                    },
                },
                WatchdogState::Stopped(exit) => break exit,
            };
        };

        info!("k8s watchdog exiting ({exit:?})");
        exit
    }
}

async fn connect(lw: &dyn ListWatch) -> anyhow::Result<WatchStream> {
    let (_, rv) = lw.list().await?;
    lw.watch(&rv).await
}
