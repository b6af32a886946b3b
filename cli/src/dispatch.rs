use crate::error::{self, Result};
use conformance_model::{
    ConformanceClient, Connector, GenConfig, PreflightConfig, RunConfig, WaitOutput,
};
use log::{debug, info};
use snafu::ResultExt;
use std::path::PathBuf;
use std::time::Duration;

/// What the user asked for with the positional argument.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Action {
    /// Print the generated manifest. Never touches the cluster.
    Gen,
    /// Submit the manifest to the cluster reached through ambient credentials.
    Run,
}

impl Action {
    pub(crate) fn parse(argument: Option<&str>) -> Result<Self> {
        match argument {
            None => error::UsageSnafu.fail(),
            Some("gen") => Ok(Action::Gen),
            Some("run") => Ok(Action::Run),
            Some(other) => error::UnsupportedSnafu { argument: other }.fail(),
        }
    }
}

/// Everything the dispatcher needs besides the action itself.
#[derive(Debug, Clone, Default)]
pub(crate) struct Options {
    /// A YAML file overriding the built-in configuration.
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) skip_preflight: bool,
    pub(crate) wait: Option<Duration>,
    pub(crate) wait_output: WaitOutput,
}

/// The successful result of an action.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum Output {
    Manifest(String),
    Submitted,
}

/// Parse `argument` and carry out the action it names. Errors are returned rather than acted on so
/// the caller alone decides the exit code.
pub(crate) async fn dispatch<C>(
    argument: Option<&str>,
    connector: &C,
    options: Options,
) -> Result<Output>
where
    C: Connector,
{
    let action = Action::parse(argument)?;
    let gen_config = build_config(&options)?;
    debug!("Dispatching {:?}", action);
    match action {
        Action::Gen => generate(connector, &gen_config).await,
        Action::Run => run(connector, gen_config, &options).await,
    }
}

fn build_config(options: &Options) -> Result<GenConfig> {
    match &options.config_path {
        Some(path) => {
            info!("Reading configuration overrides from '{}'", path.display());
            GenConfig::from_path(path).context(error::ConfigSnafu)
        }
        None => Ok(GenConfig::build()),
    }
}

async fn generate<C>(connector: &C, gen_config: &GenConfig) -> Result<Output>
where
    C: Connector,
{
    // Generation does not need any cluster configuration.
    let client = connector.offline_client();
    let manifest = client
        .generate_manifest(gen_config)
        .await
        .context(error::GenerateSnafu)?;
    Ok(Output::Manifest(manifest))
}

async fn run<C>(connector: &C, gen_config: GenConfig, options: &Options) -> Result<Output>
where
    C: Connector,
{
    let credentials = connector
        .credentials()
        .await
        .context(error::CredentialsSnafu)?;
    let client = connector
        .connect(credentials)
        .await
        .context(error::ClientCreateSnafu)?;

    if options.skip_preflight {
        info!("Skipping preflight checks");
    } else {
        let preflight_config = PreflightConfig {
            namespace: gen_config.config.namespace.clone(),
            ..Default::default()
        };
        let errors = client.preflight_checks(&preflight_config).await;
        if !errors.is_empty() {
            return error::PreflightSnafu { errors }.fail();
        }
    }

    let run_config = RunConfig {
        gen_config,
        wait: options.wait,
        wait_output: options.wait_output,
    };
    client.run(&run_config).await.context(error::RunSnafu)?;
    Ok(Output::Submitted)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use conformance_model::Error as ClientError;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    /// Records which collaborator functions the dispatcher calls, and fails on demand.
    #[derive(Default)]
    struct MockConnector {
        calls: Calls,
        fail_credentials: bool,
        fail_connect: bool,
        preflight_errors: usize,
        fail_run: bool,
    }

    struct MockClient {
        calls: Calls,
        preflight_errors: usize,
        fail_run: bool,
    }

    impl MockConnector {
        fn client(&self) -> MockClient {
            MockClient {
                calls: self.calls.clone(),
                preflight_errors: self.preflight_errors,
                fail_run: self.fail_run,
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConformanceClient for MockClient {
        async fn generate_manifest(
            &self,
            gen_config: &GenConfig,
        ) -> conformance_model::Result<String> {
            self.calls.lock().unwrap().push("generate");
            Ok(format!("namespace: {}", gen_config.config.namespace))
        }

        async fn preflight_checks(
            &self,
            preflight_config: &PreflightConfig,
        ) -> Vec<ClientError> {
            self.calls.lock().unwrap().push("preflight");
            (0..self.preflight_errors)
                .map(|i| ClientError::Preflight {
                    message: format!("check {} failed in {}", i, preflight_config.namespace),
                })
                .collect()
        }

        async fn run(&self, _: &RunConfig) -> conformance_model::Result<()> {
            self.calls.lock().unwrap().push("run");
            if self.fail_run {
                Err(ClientError::NoCluster)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Credentials = ();
        type Client = MockClient;

        fn offline_client(&self) -> Self::Client {
            self.client()
        }

        async fn credentials(&self) -> conformance_model::Result<()> {
            self.calls.lock().unwrap().push("credentials");
            if self.fail_credentials {
                Err(ClientError::NoCluster)
            } else {
                Ok(())
            }
        }

        async fn connect(&self, _: ()) -> conformance_model::Result<Self::Client> {
            self.calls.lock().unwrap().push("connect");
            if self.fail_connect {
                Err(ClientError::NoCluster)
            } else {
                Ok(self.client())
            }
        }
    }

    #[test]
    fn parse_actions() {
        assert_eq!(Action::parse(Some("gen")).unwrap(), Action::Gen);
        assert_eq!(Action::parse(Some("run")).unwrap(), Action::Run);
        assert!(matches!(Action::parse(None), Err(Error::Usage)));
        let error = Action::parse(Some("deploy")).unwrap_err();
        assert_eq!(error.to_string(), "argument 'deploy' is not supported");
    }

    #[tokio::test]
    async fn no_argument_does_nothing() {
        let connector = MockConnector::default();
        let result = dispatch(None, &connector, Options::default()).await;
        assert!(matches!(result, Err(Error::Usage)));
        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn unsupported_argument_does_nothing() {
        let connector = MockConnector::default();
        let result = dispatch(Some("delete"), &connector, Options::default()).await;
        assert!(matches!(result, Err(Error::Unsupported { .. })));
        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn gen_never_resolves_credentials() {
        let connector = MockConnector {
            fail_credentials: true,
            ..Default::default()
        };
        let output = dispatch(Some("gen"), &connector, Options::default())
            .await
            .unwrap();
        assert_eq!(output, Output::Manifest("namespace: sonobuoy".to_string()));
        assert_eq!(connector.calls(), vec!["generate"]);
    }

    #[tokio::test]
    async fn run_stops_when_credentials_are_missing() {
        let connector = MockConnector {
            fail_credentials: true,
            ..Default::default()
        };
        let result = dispatch(Some("run"), &connector, Options::default()).await;
        assert!(matches!(result, Err(Error::Credentials { .. })));
        assert_eq!(connector.calls(), vec!["credentials"]);
    }

    #[tokio::test]
    async fn run_stops_when_client_cannot_be_created() {
        let connector = MockConnector {
            fail_connect: true,
            ..Default::default()
        };
        let result = dispatch(Some("run"), &connector, Options::default()).await;
        assert!(matches!(result, Err(Error::ClientCreate { .. })));
        assert_eq!(connector.calls(), vec!["credentials", "connect"]);
    }

    #[tokio::test]
    async fn preflight_errors_prevent_run() {
        let connector = MockConnector {
            preflight_errors: 2,
            ..Default::default()
        };
        let result = dispatch(Some("run"), &connector, Options::default()).await;
        match result {
            Err(Error::Preflight { errors }) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[1].to_string(), "check 1 failed in sonobuoy");
            }
            other => panic!("expected preflight errors, got {:?}", other),
        }
        assert_eq!(connector.calls(), vec!["credentials", "connect", "preflight"]);
    }

    #[tokio::test]
    async fn run_after_passing_preflight() {
        let connector = MockConnector::default();
        let output = dispatch(Some("run"), &connector, Options::default())
            .await
            .unwrap();
        assert_eq!(output, Output::Submitted);
        assert_eq!(
            connector.calls(),
            vec!["credentials", "connect", "preflight", "run"]
        );
    }

    #[tokio::test]
    async fn skip_preflight() {
        let connector = MockConnector {
            preflight_errors: 1,
            ..Default::default()
        };
        let options = Options {
            skip_preflight: true,
            ..Default::default()
        };
        dispatch(Some("run"), &connector, options).await.unwrap();
        assert_eq!(connector.calls(), vec!["credentials", "connect", "run"]);
    }

    #[tokio::test]
    async fn run_failure() {
        let connector = MockConnector {
            fail_run: true,
            ..Default::default()
        };
        let result = dispatch(Some("run"), &connector, Options::default()).await;
        let error = result.unwrap_err();
        assert!(matches!(error, Error::Run { .. }));
        assert_eq!(
            error.to_string(),
            "error attempting to run sonobuoy: This operation requires a connection to a cluster"
        );
    }

    #[tokio::test]
    async fn unreadable_config_is_reported_before_any_action() {
        let connector = MockConnector::default();
        let options = Options {
            config_path: Some(PathBuf::from("/does/not/exist.yaml")),
            ..Default::default()
        };
        let result = dispatch(Some("gen"), &connector, options).await;
        assert!(matches!(result, Err(Error::Config { .. })));
        assert!(connector.calls().is_empty());
    }
}
