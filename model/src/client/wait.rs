use crate::config::WaitOutput;
use crate::constants::{AGGREGATOR_COMPONENT, ANNOTATION_STATUS, LABEL_SONOBUOY_COMPONENT};
use crate::error::{self, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use log::{info, trace};
use serde::Deserialize;
use snafu::{ensure, ResultExt};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// The JSON document the aggregator keeps in its status annotation.
#[derive(Debug, Deserialize)]
struct AggregatorStatus {
    status: String,
}

/// Poll the aggregator pod until it reports `complete` or `failed`, or `timeout` elapses.
pub(crate) async fn wait_for_completion(
    client: &Client,
    namespace: &str,
    timeout: Duration,
    output: WaitOutput,
) -> Result<()> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let params = ListParams::default().labels(&format!(
        "{}={}",
        LABEL_SONOBUOY_COMPONENT, AGGREGATOR_COMPONENT
    ));
    let start = Instant::now();
    info!("Waiting up to {}s for sonobuoy to finish", timeout.as_secs());

    loop {
        let pods = api.list(&params).await.context(error::KubeSnafu {
            action: "list aggregator pods",
        })?;
        let status = pods.items.first().and_then(run_status);
        match progress(status.as_deref(), start.elapsed(), timeout)? {
            Progress::Complete => {
                info!("Sonobuoy has completed");
                return Ok(());
            }
            Progress::Pending(status) => match output {
                WaitOutput::Progress => info!("Sonobuoy status: {}", status),
                WaitOutput::Silent => trace!("Sonobuoy status: {}", status),
            },
        }
        tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Progress<'a> {
    Complete,
    Pending(&'a str),
}

/// Decide what a poll that observed `status` after `elapsed` means for the wait.
fn progress<'a>(
    status: Option<&'a str>,
    elapsed: Duration,
    timeout: Duration,
) -> Result<Progress<'a>> {
    match status {
        Some("complete") => Ok(Progress::Complete),
        Some("failed") => error::RunFailedSnafu { status: "failed" }.fail(),
        status => {
            ensure!(
                elapsed < timeout,
                error::WaitTimeoutSnafu {
                    seconds: timeout.as_secs()
                }
            );
            Ok(Progress::Pending(status.unwrap_or("pending")))
        }
    }
}

/// The run status reported by an aggregator pod, if it has published one.
fn run_status(pod: &Pod) -> Option<String> {
    let annotation = pod.metadata.annotations.as_ref()?.get(ANNOTATION_STATUS)?;
    serde_json::from_str::<AggregatorStatus>(annotation)
        .ok()
        .map(|status| status.status)
}
