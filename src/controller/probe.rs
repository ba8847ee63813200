//! Operator probe
//!
//! Turns a Kubernetes context into the MeshSync controller status. Every
//! failure becomes a `DISABLED` record; callers never see an error from here.

use tracing::{debug, error, instrument, warn};

use super::state::SyncController;
use crate::error::{Error, Result};
use crate::model::{K8sContext, OperatorControllerStatus, RequestContext};

impl SyncController {
    /// MeshSync status for `ctx`
    #[instrument(skip(self, ctx), fields(context = %ctx.id))]
    pub async fn status(&self, ctx: &K8sContext) -> OperatorControllerStatus {
        let handler = match ctx.generate_kube_handler().await {
            Ok(handler) => handler,
            Err(e) => {
                error!("Failed to build Kubernetes client for {}: {}", ctx.name, e);
                return OperatorControllerStatus::disabled(&Error::MesheryClientMissing);
            }
        };

        let client = match self.operator.client_for(&handler) {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build operator client for {}: {}", ctx.name, e);
                return OperatorControllerStatus::disabled(&Error::MesheryClientMissing);
            }
        };

        match client.meshsync_info(&self.liveness).await {
            Ok(status) => {
                debug!("MeshSync on {} is {}", ctx.name, status.status);
                status
            }
            Err(e) => {
                debug!("MeshSync info unavailable on {}: {}", ctx.name, e);
                OperatorControllerStatus::disabled(&Error::MeshSyncSubscription)
            }
        }
    }

    /// Status of the in-scope context `context_id`; `NilClient` if the request
    /// does not carry it
    pub async fn operator_status(
        &self,
        req: &RequestContext,
        context_id: &str,
    ) -> Result<OperatorControllerStatus> {
        let ctx = req.kube_cluster(context_id)?;
        Ok(self.status(ctx).await)
    }
}
