/*!

Manifest transforms are pure functions over a [`PluginManifest`] that run after sonobuoy has
rendered a plugin and before the manifest is printed or submitted. [`PluginTransforms`] keeps an
ordered list of them per plugin name.

!*/

use crate::constants::{
    CONFORMANCE_IMAGE_CONFIG, CONFORMANCE_IMAGE_CONFIG_PATH, DOCKER_LIBRARY_REGISTRY, E2E_PLUGIN,
    ENV_KUBE_TEST_REPO_LIST,
};
use crate::manifest::PluginManifest;
use k8s_openapi::api::core::v1::EnvVar;
use snafu::Snafu;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// The error a transform may return.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Plugin manifest is malformed: {}", message))]
    Malformed { message: String },
}

/// A single mutation of a plugin manifest.
pub type Transform = fn(&mut PluginManifest) -> Result<(), Error>;

/// A registry mapping plugin names to the transforms applied to them, in registration order.
#[derive(Clone)]
pub struct PluginTransforms {
    transforms: BTreeMap<String, Vec<Transform>>,
}

impl Debug for PluginTransforms {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.transforms
                    .iter()
                    .map(|(plugin, transforms)| (plugin, transforms.len())),
            )
            .finish()
    }
}

impl Default for PluginTransforms {
    /// The transforms this tool ships with: the e2e plugin pulls docker library images from a
    /// mirror.
    fn default() -> Self {
        let mut transforms = Self::empty();
        transforms.register(E2E_PLUGIN, configure_docker_library_registry);
        transforms
    }
}

impl PluginTransforms {
    /// A registry with no transforms at all.
    pub fn empty() -> Self {
        Self {
            transforms: BTreeMap::new(),
        }
    }

    /// Append `transform` to the list for `plugin`.
    pub fn register<S>(&mut self, plugin: S, transform: Transform)
    where
        S: Into<String>,
    {
        self.transforms
            .entry(plugin.into())
            .or_default()
            .push(transform);
    }

    pub fn get(&self, plugin: &str) -> &[Transform] {
        self.transforms
            .get(plugin)
            .map(|transforms| transforms.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self, plugin: &str) -> usize {
        self.get(plugin).len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.values().all(|transforms| transforms.is_empty())
    }

    /// Run every transform registered for `plugin` against `manifest`, stopping at the first
    /// failure.
    pub fn apply(&self, plugin: &str, manifest: &mut PluginManifest) -> Result<(), Error> {
        for transform in self.get(plugin) {
            transform(manifest)?;
        }
        Ok(())
    }
}

/// Points the e2e test image registry at a mirror of the docker library. Sonobuoy mounts the
/// plugin's config map entries under `/tmp/sonobuoy/config`, and the e2e binary reads the
/// registry list from the file named by `KUBE_TEST_REPO_LIST`.
pub fn configure_docker_library_registry(manifest: &mut PluginManifest) -> Result<(), Error> {
    manifest
        .config_map
        .get_or_insert_with(BTreeMap::new)
        .insert(
            CONFORMANCE_IMAGE_CONFIG.to_string(),
            DOCKER_LIBRARY_REGISTRY.to_string(),
        );

    manifest.spec.env.get_or_insert_with(Vec::new).push(EnvVar {
        name: ENV_KUBE_TEST_REPO_LIST.to_string(),
        value: Some(CONFORMANCE_IMAGE_CONFIG_PATH.to_string()),
        value_from: None,
    });
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::manifest::PluginConfig;
    use k8s_openapi::api::core::v1::Container;
    use maplit::btreemap;

    fn e2e_manifest() -> PluginManifest {
        PluginManifest {
            sonobuoy_config: PluginConfig {
                plugin_name: "e2e".to_string(),
                driver: Some("Job".to_string()),
                result_format: Some("junit".to_string()),
                extra: Default::default(),
            },
            spec: Container {
                name: "e2e".to_string(),
                env: Some(vec![EnvVar {
                    name: "E2E_FOCUS".to_string(),
                    value: Some(r"\[Conformance\]".to_string()),
                    value_from: None,
                }]),
                ..Default::default()
            },
            config_map: None,
            pod_spec: None,
            extra: Default::default(),
        }
    }

    fn env_value<'a>(manifest: &'a PluginManifest, name: &str) -> Option<&'a str> {
        manifest
            .spec
            .env
            .as_ref()?
            .iter()
            .find(|env| env.name == name)
            .and_then(|env| env.value.as_deref())
    }

    #[test]
    fn registry_mirror_initializes_config_map() {
        let mut manifest = e2e_manifest();
        configure_docker_library_registry(&mut manifest).unwrap();
        assert_eq!(
            manifest.config_map.unwrap(),
            btreemap! {
                "conformance-image-config.yaml".to_string() =>
                    "dockerLibraryRegistry: mirror.gcr.io/library\n".to_string()
            }
        );
    }

    #[test]
    fn registry_mirror_keeps_existing_entries() {
        let mut manifest = e2e_manifest();
        manifest.config_map = Some(btreemap! {
            "other.yaml".to_string() => "a: b".to_string()
        });
        configure_docker_library_registry(&mut manifest).unwrap();
        let config_map = manifest.config_map.as_ref().unwrap();
        assert_eq!(config_map.len(), 2);
        assert_eq!(config_map.get("other.yaml").unwrap(), "a: b");

        // The existing env var stays first; the repo list is appended.
        let env = manifest.spec.env.as_ref().unwrap();
        assert_eq!(env.len(), 2);
        assert_eq!(env[0].name, "E2E_FOCUS");
        assert_eq!(
            env_value(&manifest, "KUBE_TEST_REPO_LIST"),
            Some("/tmp/sonobuoy/config/conformance-image-config.yaml")
        );
    }

    #[test]
    fn registry_mirror_without_env() {
        let mut manifest = e2e_manifest();
        manifest.spec.env = None;
        configure_docker_library_registry(&mut manifest).unwrap();
        assert_eq!(manifest.spec.env.as_ref().unwrap().len(), 1);
    }

    fn add_marker(manifest: &mut PluginManifest) -> Result<(), Error> {
        manifest
            .config_map
            .get_or_insert_with(BTreeMap::new)
            .insert("order".to_string(), "first".to_string());
        Ok(())
    }

    fn overwrite_marker(manifest: &mut PluginManifest) -> Result<(), Error> {
        manifest
            .config_map
            .get_or_insert_with(BTreeMap::new)
            .insert("order".to_string(), "second".to_string());
        Ok(())
    }

    fn fail(_: &mut PluginManifest) -> Result<(), Error> {
        MalformedSnafu {
            message: "no container",
        }
        .fail()
    }

    #[test]
    fn transforms_run_in_registration_order() {
        let mut transforms = PluginTransforms::empty();
        transforms.register("e2e", add_marker);
        transforms.register("e2e", overwrite_marker);
        let mut manifest = e2e_manifest();
        transforms.apply("e2e", &mut manifest).unwrap();
        assert_eq!(
            manifest.config_map.unwrap().get("order").unwrap(),
            "second"
        );
    }

    #[test]
    fn unregistered_plugin_is_untouched() {
        let transforms = PluginTransforms::default();
        let mut manifest = e2e_manifest();
        transforms.apply("systemd-logs", &mut manifest).unwrap();
        assert!(manifest.config_map.is_none());
        assert_eq!(manifest.spec.env.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn failing_transform_stops_the_chain() {
        let mut transforms = PluginTransforms::empty();
        transforms.register("e2e", fail);
        transforms.register("e2e", add_marker);
        let mut manifest = e2e_manifest();
        assert!(transforms.apply("e2e", &mut manifest).is_err());
        assert!(manifest.config_map.is_none());
    }

    #[test]
    fn empty_registry() {
        assert!(PluginTransforms::empty().is_empty());
        assert!(!PluginTransforms::default().is_empty());
    }
}
