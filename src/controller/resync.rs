//! Resync command: wipe the discovery schema and ask MeshSync to rediscover

use tracing::{info, instrument, warn};

use super::state::SyncController;
use crate::broker::{Entity, Message, REQUEST_SUBJECT};
use crate::error::{Error, Result};
use crate::model::{ResyncActions, Status};
use crate::persist::{DiscoveryTable, Provider};

impl SyncController {
    #[instrument(skip(self, provider))]
    pub async fn resync(&self, provider: &dyn Provider, actions: ResyncActions) -> Result<Status> {
        if actions.clear_db {
            let result = self.clear_discovery_data(provider, actions.force).await;
            #[cfg(feature = "metrics")]
            super::metrics::inc_resync("clear_db", result.is_ok());
            result?;
        }

        if actions.re_sync {
            let result = self
                .broker
                .publish(REQUEST_SUBJECT, &Message::request(Entity::ReSyncDiscovery))
                .await
                .map_err(Error::PublishBroker);
            #[cfg(feature = "metrics")]
            super::metrics::inc_resync("resync", result.is_ok());
            result?;
            info!("Requested MeshSync rediscovery");
        }

        Ok(Status::Processing)
    }

    async fn clear_discovery_data(&self, provider: &dyn Provider, force: bool) -> Result<()> {
        let persister = provider.generic_persister().ok_or(Error::EmptyHandler)?;

        for step in [Step::Drop, Step::Create] {
            let outcome = match step {
                Step::Drop => persister.drop_tables(&DiscoveryTable::ALL).await,
                Step::Create => persister.create_tables(&DiscoveryTable::ALL).await,
            };
            if let Err(e) = outcome {
                let err = Error::DeleteData(e);
                if !force {
                    return Err(err);
                }
                warn!("Ignoring failed {:?} during forced resync: {}", step, err);
            }
        }
        info!("Discovery tables recreated");
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Drop,
    Create,
}
