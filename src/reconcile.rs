use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::runtime::controller::{Context, ReconcilerAction};
use kube::{Resource, ResourceExt};
use thiserror::Error;
use tracing::Instrument;

use crate::pod::{PodTemplate, WorkloadTarget};
use crate::store::{ClusterStore, ObjectKey, StoreError};
use crate::types::PodPacketDumper;

pub struct Data<S> {
    pub reconciler: Reconciler<S>,
    pub error_requeue: Duration,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),
    #[error("Failed to get PodPacketDumper: {0}")]
    GetRequestFailed(#[source] StoreError),
    #[error("Failed to get Pod: {0}")]
    GetPodFailed(#[source] StoreError),
    #[error("Pod {pod} is already controlled by {kind} {name}")]
    AlreadyOwned {
        pod: ObjectKey,
        kind: String,
        name: String,
    },
    #[error("Cross-namespace owner reference from Pod {pod} to {owner} is not allowed")]
    CrossNamespaceOwner { pod: ObjectKey, owner: ObjectKey },
    #[error("Failed to create Pod: {0}")]
    CreatePodFailed(#[source] StoreError),
}

impl Error {
    /// Another reconcile created the pod first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::CreatePodFailed(StoreError::Conflict { .. }))
    }
}

/// What the controller should do after a successful reconcile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Converged; wait for the next change notification.
    Done,
    /// Run again right away to observe the mutation just made.
    Requeue,
}

impl From<Outcome> for ReconcilerAction {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => ReconcilerAction {
                requeue_after: None,
            },
            Outcome::Requeue => ReconcilerAction {
                requeue_after: Some(Duration::ZERO),
            },
        }
    }
}

/// Ensures every PodPacketDumper has exactly one companion pod.
pub struct Reconciler<S> {
    store: S,
    template: PodTemplate,
    target: WorkloadTarget,
}

impl<S: ClusterStore> Reconciler<S> {
    pub fn new(store: S, template: PodTemplate, target: WorkloadTarget) -> Self {
        Reconciler {
            store,
            template,
            target,
        }
    }

    /// Creates the companion pod of the PodPacketDumper at `key` if it is
    /// missing. Existing pods are left untouched.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome, Error> {
        let span = tracing::info_span!("reconcile", request = %key);
        self.reconcile_request(key).instrument(span).await
    }

    async fn reconcile_request(&self, key: &ObjectKey) -> Result<Outcome, Error> {
        let request = match self.store.get_request(key).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::debug!("PodPacketDumper not found, assuming it was deleted");
                return Ok(Outcome::Done);
            }
            Err(error) => {
                tracing::error!(%error, "failed to get PodPacketDumper");
                return Err(Error::GetRequestFailed(error));
            }
        };

        let pod_key = self.target.resolve(key);

        match self.store.get_pod(&pod_key).await {
            Ok(Some(_)) => {
                tracing::info!(pod = %pod_key, "pod already exists");
                return Ok(Outcome::Done);
            }
            Ok(None) => {}
            Err(error) => {
                tracing::error!(%error, pod = %pod_key, "failed to get pod");
                return Err(Error::GetPodFailed(error));
            }
        }

        let mut pod = self.template.build(&request, &pod_key);
        if let Err(error) = set_controller_reference(&request, &mut pod) {
            tracing::error!(%error, pod = %pod_key, "failed to set owner reference on pod");
            return Err(error);
        }

        match self.store.create_pod(&pod).await {
            Ok(_) => {
                tracing::info!(pod = %pod_key, "pod created");
                Ok(Outcome::Requeue)
            }
            Err(error) => {
                tracing::error!(%error, pod = %pod_key, "failed to create pod");
                Err(Error::CreatePodFailed(error))
            }
        }
    }
}

pub async fn reconcile<S: ClusterStore>(
    request: Arc<PodPacketDumper>,
    ctx: Context<Data<S>>,
) -> Result<ReconcilerAction, Error> {
    let key = ObjectKey::new(
        request
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?,
        request.name(),
    );

    let outcome = ctx.get_ref().reconciler.reconcile(&key).await?;
    Ok(outcome.into())
}

pub fn error_policy<S>(error: &Error, ctx: Context<Data<S>>) -> ReconcilerAction {
    let requeue_after = ctx.get_ref().error_requeue;
    tracing::warn!(%error, conflict = error.is_conflict(), ?requeue_after, "requeueing after error");
    ReconcilerAction {
        requeue_after: Some(requeue_after),
    }
}

/// Marks `owner` as the controller of `pod` so that deleting the owner
/// cascades to the pod.
fn set_controller_reference(owner: &PodPacketDumper, pod: &mut Pod) -> Result<(), Error> {
    let owner_key = ObjectKey::new(
        owner
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?,
        owner.name(),
    );
    let pod_key = ObjectKey::new(
        pod.namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?,
        pod.name(),
    );
    if owner_key.namespace != pod_key.namespace {
        return Err(Error::CrossNamespaceOwner {
            pod: pod_key,
            owner: owner_key,
        });
    }

    let owner_reference = OwnerReference {
        controller: Some(true),
        block_owner_deletion: Some(true),
        ..object_to_owner_reference::<PodPacketDumper>(owner.metadata.clone())?
    };

    let owner_references = pod.metadata.owner_references.get_or_insert_with(Vec::new);
    if let Some(existing) = owner_references
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != owner_reference.uid)
    {
        return Err(Error::AlreadyOwned {
            pod: pod_key,
            kind: existing.kind.clone(),
            name: existing.name.clone(),
        });
    }

    owner_references.retain(|r| r.uid != owner_reference.uid);
    owner_references.push(owner_reference);
    Ok(())
}

fn object_to_owner_reference<K: Resource<DynamicType = ()>>(
    meta: ObjectMeta,
) -> Result<OwnerReference, Error> {
    Ok(OwnerReference {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
        name: meta.name.ok_or(Error::MissingObjectKey(".metadata.name"))?,
        uid: meta.uid.ok_or(Error::MissingObjectKey(".metadata.uid"))?,
        ..OwnerReference::default()
    })
}
