#[path = "../types.rs"]
mod types;

use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&types::PodPacketDumper::crd())?);
    Ok(())
}
