use super::{apply, preflight, wait, ConformanceClient, Connector};
use crate::error::{self, Error, Result};
use crate::manifest::GeneratedManifest;
use crate::{GenConfig, PreflightConfig, RunConfig};
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use log::{debug, info};
use snafu::{ensure, OptionExt, ResultExt};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

/// A [`ConformanceClient`] that renders manifests with the `sonobuoy` executable and submits them
/// to the cluster with a `kube::Client`.
pub struct SonobuoyClient {
    sonobuoy_path: PathBuf,
    k8s_client: Option<Client>,
}

impl SonobuoyClient {
    /// Create a client that can generate manifests but cannot talk to a cluster.
    pub fn offline<P>(sonobuoy_path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            sonobuoy_path: sonobuoy_path.into(),
            k8s_client: None,
        }
    }

    /// Create a client bound to `k8s_client`.
    pub fn new<P>(k8s_client: Client, sonobuoy_path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            sonobuoy_path: sonobuoy_path.into(),
            k8s_client: Some(k8s_client),
        }
    }

    fn k8s_client(&self) -> Result<&Client> {
        self.k8s_client.as_ref().context(error::NoClusterSnafu)
    }

    /// Run `sonobuoy gen` and apply the plugin transforms to its output.
    async fn generate(&self, gen_config: &GenConfig) -> Result<GeneratedManifest> {
        // Sonobuoy reads its aggregator config from a file; it must outlive the process.
        let config_file = NamedTempFile::new().context(error::IoSnafu {
            action: "create sonobuoy config file",
        })?;
        serde_json::to_writer(config_file.as_file(), &gen_config.config)
            .context(error::JsonSerializeSnafu)?;

        let args = gen_args(gen_config, config_file.path());
        info!("Generating sonobuoy manifest");
        debug!(
            "Running '{} {}'",
            self.sonobuoy_path.display(),
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        let output = Command::new(&self.sonobuoy_path)
            .args(&args)
            .output()
            .context(error::SonobuoyProcessSnafu {
                path: &self.sonobuoy_path,
            })?;
        ensure!(
            output.status.success(),
            error::SonobuoyStatusSnafu {
                command: "gen",
                code: output.status.code().unwrap_or(1),
                stderr: String::from_utf8_lossy(&output.stderr).trim(),
            }
        );

        let mut manifest = GeneratedManifest::parse(&String::from_utf8_lossy(&output.stdout))?;
        manifest.apply_transforms(&gen_config.plugin_transforms)?;
        Ok(manifest)
    }
}

#[async_trait]
impl ConformanceClient for SonobuoyClient {
    async fn generate_manifest(&self, gen_config: &GenConfig) -> Result<String> {
        self.generate(gen_config).await?.render()
    }

    async fn preflight_checks(&self, preflight_config: &PreflightConfig) -> Vec<Error> {
        match self.k8s_client() {
            Ok(client) => preflight::preflight_checks(client, preflight_config).await,
            Err(e) => vec![e],
        }
    }

    async fn run(&self, run_config: &RunConfig) -> Result<()> {
        let client = self.k8s_client()?;
        let manifest = self.generate(&run_config.gen_config).await?;

        info!("Submitting sonobuoy manifest");
        apply::apply_documents(client, &manifest.json_documents()?).await?;
        info!(
            "Sonobuoy is running in namespace '{}'",
            run_config.gen_config.config.namespace
        );

        if let Some(timeout) = run_config.wait {
            wait::wait_for_completion(
                client,
                &run_config.gen_config.config.namespace,
                timeout,
                run_config.wait_output,
            )
            .await?;
        }
        Ok(())
    }
}

/// The arguments for `sonobuoy gen` given the path of the serialized aggregator config.
pub(crate) fn gen_args(gen_config: &GenConfig, config_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["gen".into(), "--config".into(), config_path.into()];
    if !gen_config.kube_version.is_empty() {
        args.push("--kubernetes-version".into());
        args.push(gen_config.kube_version.clone().into());
    }
    for plugin in &gen_config.dynamic_plugins {
        args.push("--plugin".into());
        args.push(plugin.into());
    }
    for (plugin, env) in &gen_config.plugin_env_overrides {
        for (key, value) in env {
            args.push("--plugin-env".into());
            args.push(format!("{}.{}={}", plugin, key, value).into());
        }
    }
    args.push("--rbac".into());
    args.push(if gen_config.enable_rbac { "Enable" } else { "Disable" }.into());
    args.push("--image-pull-policy".into());
    args.push(gen_config.image_pull_policy.clone().into());
    if !gen_config.ssh_key_path.is_empty() {
        args.push("--ssh-key-path".into());
        args.push(gen_config.ssh_key_path.clone().into());
    }
    if gen_config.show_default_pod_spec {
        args.push("--show-default-podspec".into());
    }
    args
}

/// Builds [`SonobuoyClient`]s from an explicit kubeconfig or from the ambient environment
/// (`KUBECONFIG`, `~/.kube/config`, or the in-cluster service account).
#[derive(Debug, Clone)]
pub struct SonobuoyConnector {
    kubeconfig: Option<PathBuf>,
    sonobuoy_path: PathBuf,
}

impl SonobuoyConnector {
    pub fn new<P>(kubeconfig: Option<PathBuf>, sonobuoy_path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            kubeconfig,
            sonobuoy_path: sonobuoy_path.into(),
        }
    }
}

#[async_trait]
impl Connector for SonobuoyConnector {
    type Credentials = Config;
    type Client = SonobuoyClient;

    fn offline_client(&self) -> Self::Client {
        SonobuoyClient::offline(self.sonobuoy_path.clone())
    }

    async fn credentials(&self) -> Result<Self::Credentials> {
        match &self.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).context(error::KubeconfigReadSnafu)?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context(error::KubeconfigReadSnafu)
            }
            None => Config::infer().await.context(error::ConfigInferSnafu),
        }
    }

    async fn connect(&self, credentials: Self::Credentials) -> Result<Self::Client> {
        let client = Client::try_from(credentials).context(error::ClientCreateSnafu)?;
        Ok(SonobuoyClient::new(client, self.sonobuoy_path.clone()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transform::PluginTransforms;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn default_gen_args() {
        let args = strings(gen_args(&GenConfig::default(), Path::new("/tmp/config.json")));
        assert_eq!(
            args,
            vec![
                "gen",
                "--config",
                "/tmp/config.json",
                "--kubernetes-version",
                "v1.27.3",
                "--plugin",
                "e2e",
                "--plugin-env",
                r"e2e.E2E_FOCUS=\[Conformance\]",
                "--plugin-env",
                "e2e.E2E_PARALLEL=false",
                "--plugin-env",
                "e2e.E2E_SKIP=",
                "--plugin-env",
                "e2e.SONOBUOY_K8S_VERSION=v1.27.3",
                "--rbac",
                "Enable",
                "--image-pull-policy",
                "IfNotPresent",
            ]
        );
    }

    #[test]
    fn optional_gen_args() {
        let gen_config = GenConfig {
            kube_version: String::new(),
            enable_rbac: false,
            ssh_key_path: "/root/.ssh/id_rsa".to_string(),
            show_default_pod_spec: true,
            dynamic_plugins: vec!["e2e".to_string(), "systemd-logs".to_string()],
            plugin_env_overrides: Default::default(),
            plugin_transforms: PluginTransforms::empty(),
            ..Default::default()
        };
        let args = strings(gen_args(&gen_config, Path::new("config.json")));
        assert!(!args.contains(&"--kubernetes-version".to_string()));
        assert!(!args.contains(&"--plugin-env".to_string()));
        assert_eq!(args.iter().filter(|arg| *arg == "--plugin").count(), 2);
        assert!(args.windows(2).any(|w| w[0] == "--rbac" && w[1] == "Disable"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--ssh-key-path" && w[1] == "/root/.ssh/id_rsa"));
        assert_eq!(args.last().unwrap(), "--show-default-podspec");
    }

    #[tokio::test]
    async fn offline_client_refuses_cluster_operations() {
        let client = SonobuoyClient::offline("sonobuoy");
        let errors = client.preflight_checks(&PreflightConfig::default()).await;
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::NoCluster));
        assert!(matches!(
            client.run(&RunConfig::default()).await,
            Err(Error::NoCluster)
        ));
    }

    #[tokio::test]
    async fn missing_sonobuoy_binary() {
        let client = SonobuoyClient::offline("/does/not/exist/sonobuoy");
        let error = client
            .generate_manifest(&GenConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::SonobuoyProcess { .. }));
    }

    #[tokio::test]
    async fn explicit_kubeconfig_that_does_not_exist() {
        let connector = SonobuoyConnector::new(Some(PathBuf::from("/does/not/exist")), "sonobuoy");
        assert!(matches!(
            connector.credentials().await,
            Err(Error::KubeconfigRead { .. })
        ));
    }
}
