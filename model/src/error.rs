use snafu::Snafu;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for the conformance client and its configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Unable to read configuration file '{}': {}", path.display(), source))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse configuration file '{}': {}", path.display(), source))]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unable to infer the Kubernetes config: {}", source))]
    ConfigInfer { source: kube::config::InferConfigError },

    #[snafu(display("Unable to read kubeconfig: {}", source))]
    KubeconfigRead {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Unable to create client: {}", source))]
    ClientCreate { source: kube::Error },

    #[snafu(display("Unable to {}: {}", action, source))]
    Io {
        action: String,
        source: std::io::Error,
    },

    #[snafu(display("Could not serialize object: {}", source))]
    JsonSerialize { source: serde_json::Error },

    #[snafu(display("Unable to {}: {}", action, source))]
    Kube { action: String, source: kube::Error },

    #[snafu(display("Manifest document is missing '{}'", field))]
    ManifestField { field: String },

    #[snafu(display("This operation requires a connection to a cluster"))]
    NoCluster,

    #[snafu(display("{}", message))]
    Preflight { message: String },

    #[snafu(display("Unable to run '{}': {}", path.display(), source))]
    SonobuoyProcess {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("'sonobuoy {}' failed with exit code {}: {}", command, code, stderr))]
    SonobuoyStatus {
        command: String,
        code: i32,
        stderr: String,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    SerdeYaml {
        action: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unable to apply transform to plugin '{}': {}", plugin, source))]
    Transform {
        plugin: String,
        source: crate::transform::Error,
    },

    #[snafu(display("Unknown resource type '{}/{}'", api_version, kind))]
    UnknownResource { api_version: String, kind: String },

    #[snafu(display("Sonobuoy run did not complete within {} seconds", seconds))]
    WaitTimeout { seconds: u64 },

    #[snafu(display("Sonobuoy run reported status '{}'", status))]
    RunFailed { status: String },
}
