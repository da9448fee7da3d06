use std::time::Duration;

use clap::Parser;

use crate::pod::{PodTemplate, WorkloadTarget, DEFAULT_IMAGE};
use crate::store::ObjectKey;

/// Controller that keeps one packet dumper pod per PodPacketDumper.
#[derive(Parser, Debug, Clone)]
#[command(name = "controller", version)]
pub struct Config {
    /// Only watch PodPacketDumpers in this namespace (all namespaces if unset).
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Create every companion pod as <namespace>/<name> instead of one pod
    /// per request.
    #[arg(long, env = "PACKET_DUMPER_FIXED_POD", value_name = "NAMESPACE/NAME")]
    pub fixed_pod: Option<ObjectKey>,

    /// Image of the packet dumper container.
    #[arg(long, env = "PACKET_DUMPER_IMAGE", default_value = DEFAULT_IMAGE)]
    pub image: String,

    /// Seconds to wait before retrying a failed reconcile.
    #[arg(long, env = "PACKET_DUMPER_ERROR_REQUEUE_SECS", default_value_t = 3)]
    pub error_requeue_secs: u64,

    /// Apply the PodPacketDumper CRD at startup instead of requiring it.
    #[arg(long, env = "PACKET_DUMPER_INSTALL_CRD")]
    pub install_crd: bool,
}

impl Config {
    pub fn workload_target(&self) -> WorkloadTarget {
        match &self.fixed_pod {
            Some(key) => WorkloadTarget::Fixed(key.clone()),
            None => WorkloadTarget::PerRequest,
        }
    }

    pub fn pod_template(&self) -> PodTemplate {
        PodTemplate {
            image: self.image.clone(),
        }
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }
}
