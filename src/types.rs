use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PodPacketDumperSpec defines the desired state of PodPacketDumper
#[derive(Serialize, Deserialize, JsonSchema, CustomResource, Clone, Debug, Default)]
#[kube(
    group = "tcpdump.example.com",
    version = "v1alpha1",
    kind = "PodPacketDumper",
    shortname = "ppd",
    namespaced
)]
#[kube(status = "PodPacketDumperStatus")]
#[serde(rename_all = "camelCase")]
pub struct PodPacketDumperSpec {
    /// Free-form configuration. Not yet projected into the companion pod.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foo: Option<String>,
}

/// PodPacketDumperStatus defines the observed state of PodPacketDumper
#[derive(Serialize, Deserialize, JsonSchema, Clone, Debug, Default)]
pub struct PodPacketDumperStatus {}
