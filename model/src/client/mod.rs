/*!

The seam between this tool and sonobuoy. [`ConformanceClient`] is the fixed call contract the
command line drives: generate a manifest, run preflight checks, run the conformance workflow.
[`Connector`] resolves ambient cluster credentials and builds a client bound to them, so callers
can swap both halves out in tests.

!*/

mod apply;
mod preflight;
mod sonobuoy;
mod wait;

pub use sonobuoy::{SonobuoyClient, SonobuoyConnector};

use crate::{Error, GenConfig, PreflightConfig, Result, RunConfig};
use async_trait::async_trait;

/// The operations sonobuoy exposes to this tool.
#[async_trait]
pub trait ConformanceClient: Send + Sync {
    /// Render the manifest for `gen_config`, with all plugin transforms applied. This never
    /// requires a cluster.
    async fn generate_manifest(&self, gen_config: &GenConfig) -> Result<String>;

    /// Check the cluster for unmet prerequisites. Every failed check is reported; an empty list
    /// means the run can proceed.
    async fn preflight_checks(&self, preflight_config: &PreflightConfig) -> Vec<Error>;

    /// Submit the generated manifest to the cluster and, if requested, wait for it to finish.
    async fn run(&self, run_config: &RunConfig) -> Result<()>;
}

/// Produces [`ConformanceClient`]s, either offline or bound to cluster credentials.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Cluster connection and authentication material.
    type Credentials: Send;

    type Client: ConformanceClient;

    /// A client that can only generate manifests.
    fn offline_client(&self) -> Self::Client;

    /// Resolve credentials from the environment.
    async fn credentials(&self) -> Result<Self::Credentials>;

    /// Construct a client bound to `credentials`.
    async fn connect(&self, credentials: Self::Credentials) -> Result<Self::Client>;
}
