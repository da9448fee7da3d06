use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use thiserror::Error;

use crate::types::PodPacketDumper;

/// Namespace and name of a namespaced object.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(ObjectKey::new(namespace, name))
            }
            _ => Err(format!("expected <namespace>/<name>, got {:?}", s)),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {name} already exists")]
    Conflict { kind: &'static str, name: String },
    #[error("API request failed: {0}")]
    Api(#[source] kube::Error),
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        StoreError::Api(error)
    }
}

/// The cluster operations the reconciler depends on.
///
/// Reads map "not found" to `Ok(None)`. `create_pod` is exclusive: creating a
/// pod whose key is already taken fails with [`StoreError::Conflict`].
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_request(&self, key: &ObjectKey) -> Result<Option<PodPacketDumper>, StoreError>;

    async fn get_pod(&self, key: &ObjectKey) -> Result<Option<Pod>, StoreError>;

    async fn create_pod(&self, pod: &Pod) -> Result<Pod, StoreError>;
}

#[async_trait]
impl<T: ClusterStore + ?Sized> ClusterStore for Arc<T> {
    async fn get_request(&self, key: &ObjectKey) -> Result<Option<PodPacketDumper>, StoreError> {
        (**self).get_request(key).await
    }

    async fn get_pod(&self, key: &ObjectKey) -> Result<Option<Pod>, StoreError> {
        (**self).get_pod(key).await
    }

    async fn create_pod(&self, pod: &Pod) -> Result<Pod, StoreError> {
        (**self).create_pod(pod).await
    }
}

/// [`ClusterStore`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        KubeStore { client }
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_request(&self, key: &ObjectKey) -> Result<Option<PodPacketDumper>, StoreError> {
        let api = Api::<PodPacketDumper>::namespaced(self.client.clone(), &key.namespace);
        match api.get(&key.name).await {
            Ok(request) => Ok(Some(request)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_pod(&self, key: &ObjectKey) -> Result<Option<Pod>, StoreError> {
        let api = Api::<Pod>::namespaced(self.client.clone(), &key.namespace);
        match api.get(&key.name).await {
            Ok(pod) => Ok(Some(pod)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_pod(&self, pod: &Pod) -> Result<Pod, StoreError> {
        let namespace = pod.namespace().unwrap_or_else(|| "default".to_string());
        let api = Api::<Pod>::namespaced(self.client.clone(), &namespace);
        match api.create(&PostParams::default(), pod).await {
            Ok(created) => Ok(created),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(StoreError::Conflict {
                kind: "Pod",
                name: pod.name(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
