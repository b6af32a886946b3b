use crate::constants::MINIMUM_KUBE_MINOR_VERSION;
use crate::error::{self, Error, Result};
use crate::PreflightConfig;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::{Api, ListParams};
use kube::Client;
use log::{debug, info};
use snafu::{ensure, OptionExt, ResultExt};

/// Run every preflight check and collect the failures.
pub(crate) async fn preflight_checks(
    client: &Client,
    preflight_config: &PreflightConfig,
) -> Vec<Error> {
    info!("Running preflight checks");
    let mut errors = Vec::new();
    if let Err(e) = dns_check(client, preflight_config).await {
        errors.push(e);
    }
    if let Err(e) = version_check(client).await {
        errors.push(e);
    }
    if let Err(e) = existing_namespace_check(client, &preflight_config.namespace).await {
        errors.push(e);
    }
    debug!("Preflight checks found {} problem(s)", errors.len());
    errors
}

/// Pods matching at least one of the DNS labels must exist.
async fn dns_check(client: &Client, preflight_config: &PreflightConfig) -> Result<()> {
    if preflight_config.dns_pod_labels.is_empty() {
        return Ok(());
    }
    let api: Api<Pod> = Api::namespaced(client.clone(), &preflight_config.dns_namespace);
    for label in &preflight_config.dns_pod_labels {
        let pods = api
            .list(&ListParams::default().labels(label))
            .await
            .context(error::KubeSnafu {
                action: "list dns pods",
            })?;
        if !pods.items.is_empty() {
            debug!("Found {} dns pod(s) with label {}", pods.items.len(), label);
            return Ok(());
        }
    }
    error::PreflightSnafu {
        message: format!(
            "no dns pods found with the labels [{}] in namespace {}",
            preflight_config.dns_pod_labels.join(", "),
            preflight_config.dns_namespace
        ),
    }
    .fail()
}

async fn version_check(client: &Client) -> Result<()> {
    let info = client
        .apiserver_version()
        .await
        .context(error::KubeSnafu {
            action: "get api server version",
        })?;
    let minor = parse_minor_version(&info.minor).context(error::PreflightSnafu {
        message: format!("unable to parse kubernetes minor version '{}'", info.minor),
    })?;
    ensure!(
        info.major == "1" && minor >= MINIMUM_KUBE_MINOR_VERSION,
        error::PreflightSnafu {
            message: format!(
                "kubernetes version {} is below the minimum supported version 1.{}",
                info.git_version, MINIMUM_KUBE_MINOR_VERSION
            ),
        }
    );
    Ok(())
}

async fn existing_namespace_check(client: &Client, namespace: &str) -> Result<()> {
    let api: Api<Namespace> = Api::all(client.clone());
    let existing = api.get_opt(namespace).await.context(error::KubeSnafu {
        action: format!("get namespace '{}'", namespace),
    })?;
    ensure!(
        existing.is_none(),
        error::PreflightSnafu {
            message: format!("namespace {} already exists", namespace),
        }
    );
    Ok(())
}

/// Managed clusters report minor versions such as `27+`.
pub(crate) fn parse_minor_version(minor: &str) -> Option<u32> {
    minor
        .trim_end_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .ok()
}
