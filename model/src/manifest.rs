use crate::constants::PLUGINS_CONFIG_MAP;
use crate::error::{self, Result};
use crate::transform::PluginTransforms;
use k8s_openapi::api::core::v1::Container;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;

/// A sonobuoy plugin definition, as found in the `sonobuoy-plugins-cm` config map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    #[serde(rename = "sonobuoy-config")]
    pub sonobuoy_config: PluginConfig,
    /// The plugin's main container.
    pub spec: Container,
    /// Files sonobuoy mounts into the plugin pod under `/tmp/sonobuoy/config`.
    #[serde(
        rename = "config-map",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub config_map: Option<BTreeMap<String, String>>,
    #[serde(rename = "podSpec", default, skip_serializing_if = "Option::is_none")]
    pub pod_spec: Option<Value>,
    /// Keys we do not model are carried through unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginConfig {
    pub plugin_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_format: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The multi-document YAML produced by `sonobuoy gen`, in the order sonobuoy emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedManifest {
    documents: Vec<Value>,
}

impl GeneratedManifest {
    /// Split `manifest` into its documents. Empty documents are dropped.
    pub fn parse(manifest: &str) -> Result<Self> {
        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(manifest) {
            let value = Value::deserialize(document).context(error::SerdeYamlSnafu {
                action: "parse generated manifest",
            })?;
            if !value.is_null() {
                documents.push(value);
            }
        }
        trace!("Parsed {} manifest documents", documents.len());
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[Value] {
        &self.documents
    }

    /// The documents converted to JSON for submission to the API server.
    pub fn json_documents(&self) -> Result<Vec<serde_json::Value>> {
        self.documents
            .iter()
            .map(|document| serde_json::to_value(document).context(error::JsonSerializeSnafu))
            .collect()
    }

    /// Every plugin definition carried by the plugins config map, keyed by its data entry.
    pub fn plugins(&self) -> Result<BTreeMap<String, PluginManifest>> {
        let mut plugins = BTreeMap::new();
        for document in &self.documents {
            if !is_plugins_config_map(document) {
                continue;
            }
            for (key, value) in plugin_entries(document)? {
                plugins.insert(key.to_string(), parse_plugin(value)?);
            }
        }
        Ok(plugins)
    }

    /// Apply `transforms` to every plugin definition in the plugins config map.
    pub fn apply_transforms(&mut self, transforms: &PluginTransforms) -> Result<()> {
        if transforms.is_empty() {
            return Ok(());
        }
        for document in self.documents.iter_mut() {
            if !is_plugins_config_map(document) {
                continue;
            }
            let data = document
                .get_mut("data")
                .and_then(Value::as_mapping_mut)
                .context(error::ManifestFieldSnafu {
                    field: format!("{}.data", PLUGINS_CONFIG_MAP),
                })?;
            for (key, value) in data.iter_mut() {
                let mut plugin = parse_plugin(value)?;
                let name = plugin.sonobuoy_config.plugin_name.clone();
                debug!(
                    "Applying {} transform(s) to plugin '{}' ({})",
                    transforms.len(&name),
                    name,
                    key.as_str().unwrap_or_default()
                );
                transforms
                    .apply(&name, &mut plugin)
                    .context(error::TransformSnafu { plugin: &name })?;
                *value = Value::String(serde_yaml::to_string(&plugin).context(
                    error::SerdeYamlSnafu {
                        action: format!("serialize plugin '{}'", name),
                    },
                )?);
            }
        }
        Ok(())
    }

    /// Render the documents back into a single multi-document YAML string.
    pub fn render(&self) -> Result<String> {
        let documents = self
            .documents
            .iter()
            .map(|document| {
                serde_yaml::to_string(document).context(error::SerdeYamlSnafu {
                    action: "serialize manifest document",
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(documents.join("---\n"))
    }
}

fn is_plugins_config_map(document: &Value) -> bool {
    document.get("kind").and_then(Value::as_str) == Some("ConfigMap")
        && document
            .get("metadata")
            .and_then(|metadata| metadata.get("name"))
            .and_then(Value::as_str)
            == Some(PLUGINS_CONFIG_MAP)
}

fn plugin_entries(document: &Value) -> Result<Vec<(&str, &Value)>> {
    let data = document
        .get("data")
        .and_then(Value::as_mapping)
        .context(error::ManifestFieldSnafu {
            field: format!("{}.data", PLUGINS_CONFIG_MAP),
        })?;
    Ok(data
        .iter()
        .map(|(key, value)| (key.as_str().unwrap_or_default(), value))
        .collect())
}

fn parse_plugin(value: &Value) -> Result<PluginManifest> {
    let text = value.as_str().context(error::ManifestFieldSnafu {
        field: format!("{} plugin definition", PLUGINS_CONFIG_MAP),
    })?;
    serde_yaml::from_str(text).context(error::SerdeYamlSnafu {
        action: "parse plugin definition",
    })
}
