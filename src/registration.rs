use anyhow::{Context as _, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use crate::types::PodPacketDumper;

const FIELD_MANAGER: &str = "packet-dumper-operator";

/// Makes the PodPacketDumper kind available to the controller. With
/// `install` the CRD is applied, otherwise it must already exist.
pub async fn ensure_crd(client: Client, install: bool) -> Result<()> {
    let crds = Api::<CustomResourceDefinition>::all(client);
    let name = PodPacketDumper::crd_name();

    if install {
        crds.patch(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(PodPacketDumper::crd()),
        )
        .await
        .with_context(|| format!("failed to apply CustomResourceDefinition {}", name))?;
        tracing::info!(crd = name, "applied CustomResourceDefinition");
        return Ok(());
    }

    match crds.get(name).await {
        Ok(_) => {
            tracing::debug!(crd = name, "found CustomResourceDefinition");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => Err(anyhow::anyhow!(
            "CustomResourceDefinition {} is not installed; apply the output of crdgen or pass --install-crd",
            name
        )),
        Err(e) => {
            Err(e).with_context(|| format!("failed to get CustomResourceDefinition {}", name))
        }
    }
}
