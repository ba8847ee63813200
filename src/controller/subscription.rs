//! MeshSync status subscription

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use super::state::SyncController;
use crate::error::Result;
use crate::model::{K8sContext, OperatorControllerStatus, RequestContext};
use crate::persist::Provider;

impl SyncController {
    /// Stream the MeshSync status of the request's first context
    ///
    /// The first subscription also starts the event pump and sends the
    /// install token. The stream ends when the request is cancelled, the
    /// controller shuts down, or the receiver is dropped.
    #[instrument(skip_all)]
    pub async fn listen_to_meshsync_events(
        self: &Arc<Self>,
        req: RequestContext,
        provider: Arc<dyn Provider>,
    ) -> Result<mpsc::Receiver<OperatorControllerStatus>> {
        self.broker_sender().await;

        let contexts = req.kube_clusters()?.to_vec();
        let primary = contexts[0].clone();
        let prev = self.status(&primary).await;

        let (tx, rx) = mpsc::channel(1);
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller
                .run_status_loop(req, contexts, primary, provider, prev, tx)
                .await;
        });
        Ok(rx)
    }

    async fn run_status_loop(
        &self,
        req: RequestContext,
        contexts: Vec<K8sContext>,
        primary: K8sContext,
        provider: Arc<dyn Provider>,
        mut prev: OperatorControllerStatus,
        tx: mpsc::Sender<OperatorControllerStatus>,
    ) {
        info!("Initializing MeshSync subscription");
        self.start_event_pump(contexts, &*provider).await;
        self.signal_install().await;

        let cancelled = req.cancellation().clone();
        loop {
            let status = self.status(&primary).await;
            #[cfg(feature = "metrics")]
            super::metrics::inc_status_poll(status.status);
            if status.status != prev.status {
                info!(
                    "MeshSync status on {} changed from {} to {}",
                    primary.name, prev.status, status.status
                );
            }
            prev = status.clone();

            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = self.shutdown.cancelled() => break,
                sent = tx.send(status) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }

            tokio::select! {
                _ = cancelled.cancelled() => break,
                _ = self.shutdown.cancelled() => break,
                _ = tx.closed() => break,
                _ = sleep(self.config.poll_interval) => {}
            }
        }
        debug!("MeshSync subscription for {} ended", primary.name);
    }
}
