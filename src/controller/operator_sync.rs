//! Operator-sync entrypoints that report progress on the broadcast bus

use tracing::{error, instrument};

use super::state::SyncController;
use crate::broadcast::{BroadcastMessage, BroadcastSource};
use crate::error::Result;
use crate::model::{RequestContext, Status};

impl SyncController {
    /// Bind `context_id` to its broker, reporting progress on the bus
    ///
    /// An error means the connection is `DISABLED`.
    #[instrument(skip(self, req))]
    pub async fn connect_to_nats(&self, req: &RequestContext, context_id: &str) -> Result<Status> {
        self.bus.submit(BroadcastMessage::health(
            BroadcastSource::OperatorSyncChannel,
            true,
        ));

        if let Err(e) = self.connect(req, context_id).await {
            error!("Failed to connect {} to the broker: {}", context_id, e);
            self.bus.submit(BroadcastMessage::error(
                BroadcastSource::OperatorSyncChannel,
                &e,
            ));
            return Err(e);
        }

        self.bus.submit(BroadcastMessage::health(
            BroadcastSource::OperatorSyncChannel,
            false,
        ));
        Ok(Status::Connected)
    }

    /// Acknowledge a MeshSync deployment request; the operator performs the rollout
    pub fn deploy_meshsync(&self) -> Status {
        self.bus.submit(BroadcastMessage::health(
            BroadcastSource::OperatorSyncChannel,
            true,
        ));
        self.bus.submit(BroadcastMessage::health(
            BroadcastSource::OperatorSyncChannel,
            false,
        ));
        Status::Processing
    }
}
