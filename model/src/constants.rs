/// Helper macro to avoid retyping the path under which sonobuoy mounts plugin configuration files.
/// When given no parameters, this returns the directory. When given a string literal parameter it
/// adds `/parameter` to the end.
macro_rules! plugin_config_dir {
    () => {
        "/tmp/sonobuoy/config"
    };
    ($s:literal) => {
        concat!(plugin_config_dir!(), "/", $s)
    };
}

// Versions
pub const SONOBUOY_VERSION: &str = "v0.56.16";
pub const K8S_VERSION: &str = "v1.27.3";

// Sonobuoy system identifiers
pub const NAMESPACE: &str = "sonobuoy";
pub const SERVICE_ACCOUNT: &str = "sonobuoy-serviceaccount";
pub const WORKER_IMAGE: &str = concat!("sonobuoy/sonobuoy:", "v0.56.16");
pub const PLUGINS_CONFIG_MAP: &str = "sonobuoy-plugins-cm";
pub const RESULTS_DIR: &str = "/tmp/sonobuoy/results";

// Plugin names
pub const E2E_PLUGIN: &str = "e2e";

// Plugin environment variables
pub const ENV_E2E_FOCUS: &str = "E2E_FOCUS";
pub const ENV_E2E_SKIP: &str = "E2E_SKIP";
pub const ENV_E2E_PARALLEL: &str = "E2E_PARALLEL";
pub const ENV_SONOBUOY_K8S_VERSION: &str = "SONOBUOY_K8S_VERSION";
pub const ENV_KUBE_TEST_REPO_LIST: &str = "KUBE_TEST_REPO_LIST";

// Conformance image registry mirror
pub const CONFORMANCE_IMAGE_CONFIG: &str = "conformance-image-config.yaml";
pub const CONFORMANCE_IMAGE_CONFIG_PATH: &str = plugin_config_dir!("conformance-image-config.yaml");
pub const DOCKER_LIBRARY_REGISTRY: &str = "dockerLibraryRegistry: mirror.gcr.io/library\n";

// Aggregator pod
pub const LABEL_SONOBUOY_COMPONENT: &str = "sonobuoy-component";
pub const AGGREGATOR_COMPONENT: &str = "aggregator";
pub const ANNOTATION_STATUS: &str = "sonobuoy.hept.io/status";

// Preflight
pub const DNS_NAMESPACE: &str = "kube-system";
pub const DNS_POD_LABELS: [&str; 2] = ["k8s-app=kube-dns", "k8s-app=coredns"];
pub const MINIMUM_KUBE_MINOR_VERSION: u32 = 17;

/// The field manager name used for server-side apply.
pub const FIELD_MANAGER: &str = "conformance";

#[test]
fn plugin_config_dir_macro_test() {
    assert_eq!("/tmp/sonobuoy/config", plugin_config_dir!());
    assert_eq!(
        "/tmp/sonobuoy/config/conformance-image-config.yaml",
        CONFORMANCE_IMAGE_CONFIG_PATH
    );
    assert_eq!(WORKER_IMAGE, format!("sonobuoy/sonobuoy:{}", SONOBUOY_VERSION));
}
