use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kc_core::errors::*;
use kc_core::logging;
use kc_core::prelude::*;
use kc_watch::{
    ClusterWatcher,
    CollectorConfig,
    DynObjHandlerFactory,
    EventBatch,
    SharedClient,
};
use tokio::io::{
    AsyncWrite,
    AsyncWriteExt,
};
use tokio_util::sync::CancellationToken;
use tracing::*;

#[derive(Parser, Debug)]
struct Options {
    #[arg(short, long)]
    config_file: String,

    #[arg(short, long, default_value = "info")]
    verbosity: String,
}

async fn write_batch<W: AsyncWrite + Unpin>(out: &mut W, batch: &EventBatch) -> EmptyResult {
    let mut line = serde_json::to_vec(batch)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    out.flush().await?;
    Ok(())
}

// Runs a single pipeline until its batch stream ends; returns an error if the pipeline couldn't
// be started at all
async fn collect_once<W: AsyncWrite + Unpin>(
    token: &CancellationToken,
    config: &CollectorConfig,
    shared_client: Arc<SharedClient>,
    out: &mut W,
) -> EmptyResult {
    let handlers = Arc::new(DynObjHandlerFactory::new(config.field_selectors.clone()));
    let mut cw = ClusterWatcher::start(token, config, shared_client, handlers).await?;

    let res = forward_batches(&mut cw, out).await;
    cw.shutdown().await;
    res
}

async fn forward_batches<W: AsyncWrite + Unpin>(cw: &mut ClusterWatcher, out: &mut W) -> EmptyResult {
    let mut fetch_done = cw.take_fetch_done();
    loop {
        tokio::select! {
            res = async {
                match fetch_done.as_mut() {
                    Some(rx) => rx.await,
                    None => std::future::pending().await,
                }
            }, if fetch_done.is_some() => {
                if res.is_ok() {
                    info!("initial fetch complete, queue depth is {}", cw.queue_depth());
                }
                fetch_done = None;
            },
            maybe_batch = cw.next_batch() => match maybe_batch {
                Some(batch) => write_batch(out, &batch).await?,
                None => {
                    warn!("event stream closed");
                    return Ok(());
                },
            },
        }
    }
}

#[instrument(skip_all, err)]
async fn run(args: Options, token: CancellationToken) -> EmptyResult {
    let config = CollectorConfig::load(&args.config_file)?;
    let shared_client = Arc::new(SharedClient::new());
    let mut stdout = tokio::io::stdout();

    while !token.is_cancelled() {
        if let Err(err) = collect_once(&token, &config, shared_client.clone(), &mut stdout).await {
            kcerr!(err, "could not start watch pipeline");
        }
        shared_client.close();

        if token.is_cancelled() {
            break;
        }
        info!("restarting watch pipeline in {ERROR_RETRY_DELAY_SECONDS} seconds");
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(ERROR_RETRY_DELAY_SECONDS)) => (),
        }
    }

    info!("shutting down");
    Ok(())
}

#[tokio::main]
async fn main() -> EmptyResult {
    let args = Options::parse();
    logging::setup(&logging::default_filter(&args.verbosity));

    let token = CancellationToken::new();
    let t = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt");
        }
        t.cancel();
    });

    run(args, token).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use kc_testutils::*;
    use kc_watch::{
        UpdateAction,
        UpdateEvent,
    };
    use rstest::*;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[tokio::test]
    async fn test_write_batch(test_pod: DynamicObject) {
        let mut batch = EventBatch::with_capacity(2);
        batch.push(UpdateEvent {
            action: UpdateAction::Added,
            resource: PODS_RESOURCE.into(),
            ts: 10,
            obj: test_pod.clone(),
            annotations: None,
        });
        batch.push(UpdateEvent {
            action: UpdateAction::Deleted,
            resource: PODS_RESOURCE.into(),
            ts: 11,
            obj: test_pod,
            annotations: Some(BTreeMap::from([("kubernetes.pod.annotation.owner".into(), "team-a".into())])),
        });

        let mut out: Vec<u8> = vec![];
        write_batch(&mut out, &batch).await.unwrap();
        write_batch(&mut out, &EventBatch::default()).await.unwrap();

        let output = String::from_utf8(out).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["events"][0]["action"], "added");
        assert_eq!(first["events"][0]["resource"], PODS_RESOURCE);
        assert_eq!(first["events"][0]["obj"]["metadata"]["name"], TEST_POD);
        assert!(first["events"][0].get("annotations").is_none());
        assert_eq!(first["events"][1]["action"], "deleted");
        assert_eq!(first["events"][1]["annotations"], json!({"kubernetes.pod.annotation.owner": "team-a"}));

        assert_eq!(lines[1], r#"{"events":[]}"#);
    }
}
