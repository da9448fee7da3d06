use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::store::ObjectKey;
use crate::types::PodPacketDumper;

pub const APP_LABEL: &str = "app";
pub const APP_LABEL_VALUE: &str = "packet-dumper";
pub const CONTAINER_NAME: &str = "packet-dumper-container";
pub const DEFAULT_IMAGE: &str = "hello.io/loopy";

const POD_NAME_SUFFIX: &str = "packet-dumper";

/// Where the companion pod of a PodPacketDumper lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkloadTarget {
    /// `<request>-packet-dumper` next to the request.
    PerRequest,
    /// One pod identity shared by every request.
    Fixed(ObjectKey),
}

impl WorkloadTarget {
    pub fn resolve(&self, request: &ObjectKey) -> ObjectKey {
        match self {
            WorkloadTarget::PerRequest => ObjectKey::new(
                request.namespace.clone(),
                format!("{}-{}", request.name, POD_NAME_SUFFIX),
            ),
            WorkloadTarget::Fixed(key) => key.clone(),
        }
    }
}

/// Builds the pod that should exist for a PodPacketDumper.
#[derive(Clone, Debug)]
pub struct PodTemplate {
    pub image: String,
}

impl Default for PodTemplate {
    fn default() -> Self {
        PodTemplate {
            image: DEFAULT_IMAGE.to_string(),
        }
    }
}

impl PodTemplate {
    // The request's spec is not projected into the container yet.
    pub fn build(&self, _request: &PodPacketDumper, target: &ObjectKey) -> Pod {
        let labels = BTreeMap::from([(APP_LABEL.to_string(), APP_LABEL_VALUE.to_string())]);

        Pod {
            metadata: ObjectMeta {
                name: Some(target.name.clone()),
                namespace: Some(target.namespace.clone()),
                labels: Some(labels),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: CONTAINER_NAME.to_string(),
                    image: Some(self.image.clone()),
                    ..Container::default()
                }],
                ..PodSpec::default()
            }),
            status: None,
        }
    }
}
