/*!

The run configuration handed to sonobuoy. `Default` produces the values this tool ships with; any
subset of fields can be overridden from a YAML file with [`GenConfig::from_path`].

The `Config` portion is serialized with sonobuoy's own key names so that it can be passed verbatim
to `sonobuoy gen --config`.

!*/

use crate::constants::{
    DNS_NAMESPACE, DNS_POD_LABELS, E2E_PLUGIN, ENV_E2E_FOCUS, ENV_E2E_PARALLEL, ENV_E2E_SKIP,
    ENV_SONOBUOY_K8S_VERSION, K8S_VERSION, NAMESPACE, RESULTS_DIR, SERVICE_ACCOUNT,
    SONOBUOY_VERSION, WORKER_IMAGE,
};
use crate::error::{self, Result};
use crate::transform::PluginTransforms;
use maplit::btreemap;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// The sonobuoy aggregator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Config {
    #[serde(rename = "Server")]
    pub aggregation: AggregationConfig,
    pub description: String,
    pub version: String,
    pub results_dir: String,
    pub filters: FilterOptions,
    pub limits: LimitConfig,
    #[serde(rename = "QPS")]
    pub qps: f32,
    pub burst: i32,
    /// `None` lets sonobuoy pick its default plugin set.
    #[serde(rename = "Plugins", skip_serializing_if = "Option::is_none")]
    pub plugin_selections: Option<Vec<PluginSelection>>,
    pub plugin_search_path: Vec<String>,
    pub namespace: String,
    pub worker_image: String,
    pub image_pull_policy: String,
    pub image_pull_secrets: String,
    pub aggregator_permissions: String,
    pub service_account_name: String,
    #[serde(rename = "NamespacePSAEnforceLevel")]
    pub namespace_psa_enforce_level: String,
    pub progress_updates_port: String,
    pub security_context_mode: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aggregation: AggregationConfig::default(),
            description: "DEFAULT".to_string(),
            version: SONOBUOY_VERSION.to_string(),
            results_dir: RESULTS_DIR.to_string(),
            filters: FilterOptions::default(),
            limits: LimitConfig::default(),
            qps: 30.0,
            burst: 50,
            plugin_selections: None,
            plugin_search_path: vec![
                "./plugins.d".to_string(),
                "/etc/sonobuoy/plugins.d".to_string(),
                "~/sonobuoy/plugins.d".to_string(),
            ],
            namespace: NAMESPACE.to_string(),
            worker_image: WORKER_IMAGE.to_string(),
            image_pull_policy: "IfNotPresent".to_string(),
            image_pull_secrets: String::new(),
            aggregator_permissions: "clusterAdmin".to_string(),
            service_account_name: SERVICE_ACCOUNT.to_string(),
            namespace_psa_enforce_level: "privileged".to_string(),
            progress_updates_port: "8099".to_string(),
            security_context_mode: "nonroot".to_string(),
        }
    }
}

/// Where the aggregator listens for results and how long it waits for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    #[serde(rename = "bindaddress")]
    pub bind_address: String,
    #[serde(rename = "bindport")]
    pub bind_port: u16,
    #[serde(rename = "timeoutseconds")]
    pub timeout_seconds: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            bind_port: 8080,
            timeout_seconds: 21600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct FilterOptions {
    /// A regex matched against namespace names.
    pub namespaces: String,
    pub label_selector: String,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            namespaces: ".*".to_string(),
            label_selector: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LimitConfig {
    pub pod_logs: PodLogLimits,
}

/// Pod log retention policy. Unset optional values are omitted so sonobuoy applies no limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PodLogLimits {
    pub namespaces: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sonobuoy_namespace: Option<bool>,
    pub field_selectors: Vec<String>,
    pub label_selector: String,
    pub previous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_time: Option<String>,
    pub timestamps: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_lines: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_bytes: Option<i64>,
}

impl Default for PodLogLimits {
    fn default() -> Self {
        Self {
            namespaces: DNS_NAMESPACE.to_string(),
            sonobuoy_namespace: Some(true),
            field_selectors: Vec::new(),
            label_selector: String::new(),
            previous: false,
            since_seconds: None,
            since_time: None,
            timestamps: false,
            tail_lines: None,
            limit_bytes: None,
        }
    }
}

/// Selects a plugin by name for the aggregator to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSelection {
    pub name: String,
}

/// Everything needed to generate a sonobuoy manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenConfig {
    pub config: Config,
    #[serde(rename = "enableRBAC")]
    pub enable_rbac: bool,
    pub image_pull_policy: String,
    pub ssh_key_path: String,
    pub dynamic_plugins: Vec<String>,
    /// Plugin name to environment variable overrides. An empty value removes the variable.
    pub plugin_env_overrides: BTreeMap<String, BTreeMap<String, String>>,
    /// Transforms cannot be expressed in a file, so overrides always keep the built-in registry.
    #[serde(skip)]
    pub plugin_transforms: PluginTransforms,
    pub show_default_pod_spec: bool,
    pub kube_version: String,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            config: Config::default(),
            enable_rbac: true,
            image_pull_policy: "IfNotPresent".to_string(),
            ssh_key_path: String::new(),
            dynamic_plugins: vec![E2E_PLUGIN.to_string()],
            plugin_env_overrides: btreemap! {
                E2E_PLUGIN.to_string() => btreemap! {
                    ENV_E2E_FOCUS.to_string() => r"\[Conformance\]".to_string(),
                    ENV_E2E_SKIP.to_string() => String::new(),
                    ENV_E2E_PARALLEL.to_string() => "false".to_string(),
                    ENV_SONOBUOY_K8S_VERSION.to_string() => K8S_VERSION.to_string(),
                },
            },
            plugin_transforms: PluginTransforms::default(),
            show_default_pod_spec: false,
            kube_version: K8S_VERSION.to_string(),
        }
    }
}

impl GenConfig {
    /// The configuration this tool ships with.
    pub fn build() -> Self {
        Self::default()
    }

    /// Read a YAML file of overrides. Fields that are not present keep their default values.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).context(error::ConfigReadSnafu { path })?;
        serde_yaml::from_str(&contents).context(error::ConfigParseSnafu { path })
    }
}

/// How progress is reported while waiting for a run to finish.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitOutput {
    #[default]
    Silent,
    Progress,
}

impl Display for WaitOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitOutput::Silent => write!(f, "silent"),
            WaitOutput::Progress => write!(f, "progress"),
        }
    }
}

impl FromStr for WaitOutput {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" => Ok(WaitOutput::Silent),
            "progress" => Ok(WaitOutput::Progress),
            other => Err(format!(
                "'{}' is not a valid wait output, try 'silent' or 'progress'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub gen_config: GenConfig,
    /// `None` returns as soon as the manifest has been applied.
    pub wait: Option<Duration>,
    pub wait_output: WaitOutput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightConfig {
    pub namespace: String,
    pub dns_namespace: String,
    /// DNS is considered healthy if pods matching any of these selectors exist.
    pub dns_pod_labels: Vec<String>,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            namespace: NAMESPACE.to_string(),
            dns_namespace: DNS_NAMESPACE.to_string(),
            dns_pod_labels: DNS_POD_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
