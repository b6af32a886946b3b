use crate::constants::FIELD_MANAGER;
use crate::error::{self, Result};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::{Discovery, Scope};
use kube::Client;
use log::{debug, info};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};

/// Server-side apply every document, in order. Sonobuoy emits the namespace and RBAC objects ahead
/// of the workloads that need them.
pub(crate) async fn apply_documents(client: &Client, documents: &[Value]) -> Result<()> {
    let discovery = Discovery::new(client.clone())
        .run()
        .await
        .context(error::KubeSnafu {
            action: "discover cluster api resources",
        })?;

    for document in documents {
        apply_document(client, &discovery, document).await?;
    }
    Ok(())
}

async fn apply_document(client: &Client, discovery: &Discovery, document: &Value) -> Result<()> {
    let api_version = field(document, "/apiVersion")?;
    let kind = field(document, "/kind")?;
    let name = field(document, "/metadata/name")?;
    let namespace = document.pointer("/metadata/namespace").and_then(Value::as_str);

    let (group, version) = parse_api_version(api_version);
    let gvk = GroupVersionKind::gvk(group, version, kind);
    let (api_resource, capabilities) =
        discovery
            .resolve_gvk(&gvk)
            .context(error::UnknownResourceSnafu {
                api_version,
                kind,
            })?;

    let api: Api<DynamicObject> = match (capabilities.scope, namespace) {
        (Scope::Namespaced, Some(namespace)) => {
            Api::namespaced_with(client.clone(), namespace, &api_resource)
        }
        (Scope::Namespaced, None) => Api::default_namespaced_with(client.clone(), &api_resource),
        (Scope::Cluster, _) => Api::all_with(client.clone(), &api_resource),
    };

    info!("Applying {} '{}'", kind, name);
    api.patch(
        name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(document),
    )
    .await
    .context(error::KubeSnafu {
        action: format!("apply {} '{}'", kind, name),
    })?;
    debug!("Applied {} '{}' in namespace {:?}", kind, name, namespace);
    Ok(())
}

fn field<'a>(document: &'a Value, pointer: &str) -> Result<&'a str> {
    document
        .pointer(pointer)
        .and_then(Value::as_str)
        .context(error::ManifestFieldSnafu {
            field: pointer.trim_start_matches('/').replace('/', "."),
        })
}

/// Split an `apiVersion` into its group and version. The core group is the empty string.
pub(crate) fn parse_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}
