mod config;
#[cfg(test)]
mod fake_store;
mod pod;
mod reconcile;
mod registration;
mod store;
mod types;

use anyhow::Result;
use clap::Parser;
use futures_util::stream::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::runtime::controller::{Context, Controller};
use kube::Client;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::Config::parse();
    tracing::info!(?config, "starting packet dumper controller");

    let client = Client::try_default().await?;

    registration::ensure_crd(client.clone(), config.install_crd).await?;

    let (request_api, pod_api) = match config.namespace.as_deref() {
        Some(namespace) => (
            Api::<types::PodPacketDumper>::namespaced(client.clone(), namespace),
            Api::<Pod>::namespaced(client.clone(), namespace),
        ),
        None => (
            Api::<types::PodPacketDumper>::all(client.clone()),
            Api::<Pod>::all(client.clone()),
        ),
    };

    let reconciler = reconcile::Reconciler::new(
        store::KubeStore::new(client),
        config.pod_template(),
        config.workload_target(),
    );

    Controller::new(request_api, ListParams::default())
        .owns(pod_api, ListParams::default())
        .shutdown_on_signal()
        .run(
            reconcile::reconcile,
            reconcile::error_policy,
            Context::new(reconcile::Data {
                reconciler,
                error_requeue: config.error_requeue(),
            }),
        )
        .for_each(|res| async move {
            match res {
                Ok(o) => tracing::info!("reconciled {:?}", o),
                Err(e) => tracing::warn!("reconcile failed: {}", e),
            }
        })
        .await;

    tracing::info!("controller terminated");

    Ok(())
}
