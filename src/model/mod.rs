//! Request, status and action types shared by the controller components

mod context;
mod status;

pub use context::{K8sContext, KubeHandler, RequestContext, ResyncActions};
pub use status::{ControllerError, OperatorControllerStatus, Status};

#[cfg(test)]
pub(crate) use context::tests::{test_context, test_kubeconfig};
