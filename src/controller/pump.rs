//! Event pump
//!
//! Two tasks started once per controller: the event listener drains the
//! broker channel and the cluster-name persistor reacts to MeshSync signals.
//! Both channels hold a single message, so a slow database stalls the broker
//! subscription rather than buffering discovery events. Contexts and the
//! persister reach both tasks through a watch channel, so subscriptions made
//! after the pump started still count.

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{MeshSyncSignal, PumpTargets, SyncController, SyncPing};
use crate::broadcast::{Broadcast, BroadcastMessage, BroadcastSource};
use crate::broker::{EventType, Message, ObjectType};
use crate::liveness::Liveness;
use crate::model::K8sContext;
use crate::persist::{Object, Provider};

/// Objects owned by the Meshery operator itself
const OPERATOR_OBJECTS: [&str; 3] = ["meshery-operator", "meshery-broker", "meshery-meshsync"];

/// Namespaces where service mesh control planes are installed
const CONTROL_PLANE_NAMESPACES: [&str; 9] = [
    "istio-system",
    "linkerd",
    "consul",
    "kuma-system",
    "nginx-mesh",
    "osm-system",
    "traefik-mesh",
    "cilium",
    "open-service-mesh",
];

/// What the listener did with one broker message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Liveness,
    Persisted,
    /// Decoded but not written (error events, missing persister)
    Skipped,
    Failed,
    Ignored,
}

impl Outcome {
    #[cfg(feature = "metrics")]
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Liveness => "liveness",
            Outcome::Persisted => "persisted",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
            Outcome::Ignored => "ignored",
        }
    }
}

pub(crate) fn is_operator_object(name: &str) -> bool {
    OPERATOR_OBJECTS.contains(&name)
}

pub(crate) fn is_control_plane_namespace(namespace: &str) -> bool {
    CONTROL_PLANE_NAMESPACES.contains(&namespace)
}

pub(crate) struct EventListener {
    bus: Broadcast,
    liveness: Liveness,
    operator_sync: broadcast::Sender<SyncPing>,
    control_plane_sync: broadcast::Sender<SyncPing>,
    meshsync_tx: mpsc::Sender<MeshSyncSignal>,
    targets: watch::Receiver<PumpTargets>,
}

impl EventListener {
    pub(crate) fn new(controller: &SyncController) -> Self {
        Self {
            bus: controller.bus.clone(),
            liveness: controller.liveness.clone(),
            operator_sync: controller.operator_sync.clone(),
            control_plane_sync: controller.control_plane_sync.clone(),
            meshsync_tx: controller.meshsync_tx.clone(),
            targets: controller.pump_targets.subscribe(),
        }
    }

    pub(crate) async fn run(self, mut rx: mpsc::Receiver<Message>, shutdown: CancellationToken) {
        info!("Listening for MeshSync events");
        loop {
            let msg = tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = rx.recv() => msg,
            };
            match msg {
                Some(msg) => {
                    self.handle(msg).await;
                }
                None => break,
            }
        }
        info!("MeshSync event listener stopped");
    }

    pub(crate) async fn handle(&self, msg: Message) -> Outcome {
        let object_type = msg.object_type.unwrap_or(ObjectType::Unknown);
        let outcome = match object_type {
            ObjectType::Liveness => {
                self.liveness.beat();
                Outcome::Liveness
            }
            ObjectType::MeshSync => self.handle_discovery(msg).await,
            ObjectType::Smi => {
                info!("Received SMI conformance result: {:?}", msg.object);
                Outcome::Ignored
            }
            ObjectType::Unknown => {
                debug!("Dropping broker message of unknown type");
                Outcome::Ignored
            }
        };

        #[cfg(feature = "metrics")]
        super::metrics::inc_discovery_event(object_type.as_str(), outcome.as_str());
        outcome
    }

    async fn handle_discovery(&self, msg: Message) -> Outcome {
        let Some(value) = msg.object else {
            warn!("Discovery message without an object");
            return Outcome::Failed;
        };
        let object = match Object::from_value(value) {
            Ok(object) => object,
            Err(e) => {
                warn!("Dropping discovery message: {}", e);
                return Outcome::Failed;
            }
        };

        if is_operator_object(object.name()) {
            let _ = self.operator_sync.send(ping(&object));
            self.bus.submit(BroadcastMessage::health(
                BroadcastSource::OperatorSyncChannel,
                false,
            ));
        }
        if is_control_plane_namespace(object.namespace()) {
            let _ = self.control_plane_sync.send(ping(&object));
        }

        let event = match msg.event_type {
            Some(EventType::Error) | None => {
                debug!("Not persisting {} event for {}", describe(msg.event_type), object.id);
                return Outcome::Skipped;
            }
            Some(event) => event,
        };

        let persister = self.targets.borrow().persister.clone();
        let Some(persister) = persister else {
            warn!("No persister available, dropping {} for {}", event, object.id);
            return Outcome::Skipped;
        };

        if let Err(e) = persister.record_object(event, &object).await {
            warn!("Failed to persist {} for {}: {}", event, object.id, e);
            return Outcome::Failed;
        }
        debug!("Persisted {} for {}/{}", event, object.namespace(), object.name());

        if self.meshsync_tx.send(MeshSyncSignal::Persisted).await.is_err() {
            debug!("Cluster-name persistor is gone");
        }
        Outcome::Persisted
    }
}

fn ping(object: &Object) -> SyncPing {
    SyncPing {
        name: object.name().to_string(),
        namespace: object.namespace().to_string(),
    }
}

fn describe(event: Option<EventType>) -> String {
    event.map(|e| e.to_string()).unwrap_or_else(|| "untyped".to_string())
}

/// Stamp context names onto discovered objects whenever MeshSync writes data
pub(crate) async fn persist_cluster_names(
    mut rx: mpsc::Receiver<MeshSyncSignal>,
    targets: watch::Receiver<PumpTargets>,
    shutdown: CancellationToken,
) {
    let mut installed = false;
    loop {
        let signal = tokio::select! {
            _ = shutdown.cancelled() => break,
            signal = rx.recv() => signal,
        };
        let Some(signal) = signal else { break };

        if !installed {
            installed = true;
            info!("MeshSync install triggered ({:?})", signal);
        }

        let PumpTargets {
            contexts,
            persister,
        } = targets.borrow().clone();
        let Some(persister) = persister else {
            debug!("No persister, skipping cluster name update");
            continue;
        };
        for ctx in &contexts {
            match persister
                .update_cluster_name(&ctx.kubernetes_server_id, &ctx.name)
                .await
            {
                Ok(updated) => debug!("Stamped cluster name {} on {} objects", ctx.name, updated),
                Err(e) => warn!("Failed to stamp cluster name {}: {}", ctx.name, e),
            }
        }
    }
    debug!("Cluster-name persistor stopped");
}

impl SyncController {
    /// Start the event pump unless it already runs; returns whether this call started it
    ///
    /// Every call adds `contexts` to the set the persistor stamps, and the
    /// provider's persister is adopted if none is held yet.
    pub(crate) async fn start_event_pump(
        &self,
        contexts: Vec<K8sContext>,
        provider: &dyn Provider,
    ) -> bool {
        let persister = provider.generic_persister();
        self.pump_targets
            .send_modify(|targets| targets.merge(contexts, persister));

        if !self.claim_pump_start() {
            return false;
        }

        let (Some(broker_rx), Some(meshsync_rx)) = (
            self.take_broker_receiver().await,
            self.take_meshsync_receiver().await,
        ) else {
            warn!("Event pump channels already taken");
            return false;
        };

        tokio::spawn(persist_cluster_names(
            meshsync_rx,
            self.pump_targets.subscribe(),
            self.shutdown.clone(),
        ));
        let listener = EventListener::new(self);
        tokio::spawn(listener.run(broker_rx, self.shutdown.clone()));
        info!("MeshSync event pump started");
        true
    }

    /// Send the one install token; later calls are no-ops
    pub(crate) async fn signal_install(&self) {
        if !self.claim_install_signal() {
            return;
        }
        if self.meshsync_tx.send(MeshSyncSignal::Install).await.is_err() {
            warn!("MeshSync install signal dropped");
        }
    }
}
