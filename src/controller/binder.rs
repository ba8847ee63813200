//! Broker binder
//!
//! Binds a Kubernetes context to the broker advertised by its operator and
//! wires MeshSync discovery events into the controller's broker channel.

use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::state::SyncController;
use crate::broadcast::{BroadcastMessage, BroadcastSource};
use crate::broker::{BrokerError, ConnectionInfo, BROKER_QUEUE, MESHSYNC_SUBJECT};
use crate::error::{Error, Result};
use crate::model::{KubeHandler, RequestContext};
use crate::operator::OperatorClient;

impl SyncController {
    /// Ensure context `context_id` is bound to a broker and subscribed
    ///
    /// Calls for an already bound context with a held broker do nothing and
    /// publish nothing on the bus.
    #[instrument(skip(self, req))]
    pub async fn connect(&self, req: &RequestContext, context_id: &str) -> Result<()> {
        let ctx = req.kube_cluster(context_id)?;
        let status = self.status(ctx).await;
        let new_context = !self.registry.is_bound(&ctx.id);

        let handler = ctx.generate_kube_handler().await.map_err(|e| {
            error!("Failed to build Kubernetes client for {}: {}", ctx.name, e);
            Error::NilClient
        })?;

        if (self.broker.is_empty().await || new_context) && status.is_enabled() {
            let endpoint = match self.subscribe_to_broker(&handler).await {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    error!("Broker subscription failed for {}: {}", ctx.id, e);
                    #[cfg(feature = "metrics")]
                    super::metrics::inc_broker_binding(false);
                    self.bus.submit(BroadcastMessage::error(
                        BroadcastSource::OperatorSyncChannel,
                        &e,
                    ));
                    return Err(Error::AddonSubscription(e));
                }
            };

            info!("Connected to broker at {}", endpoint);
            self.registry.set(&ctx.id, &endpoint);
            self.registry.log();
            #[cfg(feature = "metrics")]
            super::metrics::inc_broker_binding(true);
            self.bus.submit(BroadcastMessage::health(
                BroadcastSource::OperatorSyncChannel,
                false,
            ));
            return Ok(());
        }

        if self.broker.info().await == ConnectionInfo::NotConnected {
            return Err(Error::BrokerNotConnected);
        }

        debug!("Context {} already bound, nothing to do", ctx.id);
        Ok(())
    }

    /// Resolve the broker endpoint, dial it if needed and subscribe to discovery events
    async fn subscribe_to_broker(&self, handler: &KubeHandler) -> Result<String, BrokerError> {
        let client = self
            .operator
            .client_for(handler)
            .map_err(|e| BrokerError::EndpointUnavailable(e.to_string()))?;
        let endpoint = self.wait_for_broker_endpoint(client.as_ref()).await?;

        let broker = self.broker.ensure(&endpoint).await?;
        let tx = self.broker_sender().await;
        broker.subscribe(MESHSYNC_SUBJECT, BROKER_QUEUE, tx).await?;
        Ok(endpoint)
    }

    async fn wait_for_broker_endpoint(
        &self,
        client: &dyn OperatorClient,
    ) -> Result<String, BrokerError> {
        let attempts = self.config.broker_wait_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match client.broker_endpoint().await {
                Ok(Some(endpoint)) => return Ok(endpoint),
                Ok(None) => debug!("Broker endpoint not advertised yet ({}/{})", attempt, attempts),
                Err(e) => {
                    warn!("Broker endpoint lookup failed ({}/{}): {}", attempt, attempts, e);
                    last_error = Some(e.to_string());
                }
            }
            if attempt < attempts {
                sleep(self.config.broker_wait_interval).await;
            }
        }

        Err(BrokerError::EndpointUnavailable(last_error.unwrap_or_else(|| {
            format!("no endpoint advertised after {} attempts", attempts)
        })))
    }
}
