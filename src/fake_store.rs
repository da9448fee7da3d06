//! In-memory [`ClusterStore`] for reconciler tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;
use kube::ResourceExt;

use crate::store::{ClusterStore, ObjectKey, StoreError};
use crate::types::{PodPacketDumper, PodPacketDumperSpec};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Calls {
    pub get_request: usize,
    pub get_pod: usize,
    pub create_pod: usize,
    pub create_pod_succeeded: usize,
}

#[derive(Default)]
struct Counters {
    get_request: AtomicUsize,
    get_pod: AtomicUsize,
    create_pod: AtomicUsize,
    create_pod_succeeded: AtomicUsize,
}

#[derive(Default)]
struct Failures {
    get_request: Option<u16>,
    get_pod: Option<u16>,
    create_pod: Option<u16>,
}

#[derive(Default)]
pub struct FakeStore {
    requests: Mutex<BTreeMap<ObjectKey, PodPacketDumper>>,
    pods: Mutex<BTreeMap<ObjectKey, Pod>>,
    failures: Mutex<Failures>,
    counters: Counters,
}

impl FakeStore {
    pub fn insert_request(&self, request: PodPacketDumper) {
        let key = ObjectKey::new(request.namespace().unwrap_or_default(), request.name());
        self.requests.lock().unwrap().insert(key, request);
    }

    pub fn insert_pod(&self, pod: Pod) {
        let key = ObjectKey::new(pod.namespace().unwrap_or_default(), pod.name());
        self.pods.lock().unwrap().insert(key, pod);
    }

    pub fn pod(&self, key: &ObjectKey) -> Option<Pod> {
        self.pods.lock().unwrap().get(key).cloned()
    }

    pub fn pod_count(&self) -> usize {
        self.pods.lock().unwrap().len()
    }

    pub fn fail_get_request_with(&self, code: u16) {
        self.failures.lock().unwrap().get_request = Some(code);
    }

    pub fn fail_get_pod_with(&self, code: u16) {
        self.failures.lock().unwrap().get_pod = Some(code);
    }

    pub fn fail_create_pod_with(&self, code: u16) {
        self.failures.lock().unwrap().create_pod = Some(code);
    }

    pub fn calls(&self) -> Calls {
        Calls {
            get_request: self.counters.get_request.load(Ordering::SeqCst),
            get_pod: self.counters.get_pod.load(Ordering::SeqCst),
            create_pod: self.counters.create_pod.load(Ordering::SeqCst),
            create_pod_succeeded: self.counters.create_pod_succeeded.load(Ordering::SeqCst),
        }
    }
}

fn api_error(code: u16) -> StoreError {
    StoreError::Api(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected failure with status {}", code),
        reason: "InternalError".to_string(),
        code,
    }))
}

#[async_trait]
impl ClusterStore for FakeStore {
    async fn get_request(&self, key: &ObjectKey) -> Result<Option<PodPacketDumper>, StoreError> {
        self.counters.get_request.fetch_add(1, Ordering::SeqCst);
        let failure = self.failures.lock().unwrap().get_request;
        if let Some(code) = failure {
            return Err(api_error(code));
        }
        let request = self.requests.lock().unwrap().get(key).cloned();
        tokio::task::yield_now().await;
        Ok(request)
    }

    async fn get_pod(&self, key: &ObjectKey) -> Result<Option<Pod>, StoreError> {
        self.counters.get_pod.fetch_add(1, Ordering::SeqCst);
        let failure = self.failures.lock().unwrap().get_pod;
        if let Some(code) = failure {
            return Err(api_error(code));
        }
        let pod = self.pods.lock().unwrap().get(key).cloned();
        // Widen the window between the existence check and the create.
        tokio::task::yield_now().await;
        Ok(pod)
    }

    async fn create_pod(&self, pod: &Pod) -> Result<Pod, StoreError> {
        self.counters.create_pod.fetch_add(1, Ordering::SeqCst);
        let conflict = StoreError::Conflict {
            kind: "Pod",
            name: pod.name(),
        };
        let failure = self.failures.lock().unwrap().create_pod;
        match failure {
            Some(409) => return Err(conflict),
            Some(code) => return Err(api_error(code)),
            None => {}
        }

        let key = ObjectKey::new(pod.namespace().unwrap_or_default(), pod.name());
        let mut pods = self.pods.lock().unwrap();
        if pods.contains_key(&key) {
            return Err(conflict);
        }
        pods.insert(key, pod.clone());
        self.counters
            .create_pod_succeeded
            .fetch_add(1, Ordering::SeqCst);
        Ok(pod.clone())
    }
}

pub fn sample_request(namespace: &str, name: &str, uid: &str) -> PodPacketDumper {
    let mut request = PodPacketDumper::new(name, PodPacketDumperSpec::default());
    request.metadata.namespace = Some(namespace.to_string());
    request.metadata.uid = Some(uid.to_string());
    request
}

pub fn sample_pod(namespace: &str, name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "existing".to_string(),
                image: Some("busybox".to_string()),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
        status: None,
    }
}
