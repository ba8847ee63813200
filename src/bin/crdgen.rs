use kube::CustomResourceExt;
use meshsync_controller::crd::{Broker, MeshSync};

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&Broker::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&MeshSync::crd())?);
    Ok(())
}
