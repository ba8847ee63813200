//! Shared controller state
//!
//! [`SyncController`] owns everything the MeshSync components share: the
//! connection registry, the broker connections, the broadcast bus, the internal
//! channels between the status subscription and the event pump, and the
//! one-shot startup flags. Components are implemented as `impl` blocks in
//! their own modules.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::config::ControllerConfig;
use super::registry::ConnectionRegistry;
use crate::broadcast::Broadcast;
use crate::broker::{BrokerConnection, BrokerDialer, Message};
use crate::liveness::Liveness;
use crate::model::K8sContext;
use crate::operator::OperatorClientFactory;
use crate::persist::Persister;

/// Capacity of the broker and MeshSync channels; the pump handles one
/// message at a time
pub(crate) const PUMP_CHANNEL_CAPACITY: usize = 1;

const SYNC_PING_CAPACITY: usize = 16;

/// Signals consumed by the cluster-name persistor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshSyncSignal {
    /// Sent once per controller when the first subscription starts
    Install,
    /// A discovery object was written
    Persisted,
}

/// Notification that an operator or control-plane object changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncPing {
    pub name: String,
    pub namespace: String,
}

/// Contexts and persister the event pump works with
///
/// Grows as subscriptions arrive; the first persister seen is kept.
#[derive(Clone, Default)]
pub(crate) struct PumpTargets {
    pub(crate) contexts: Vec<K8sContext>,
    pub(crate) persister: Option<Arc<dyn Persister>>,
}

impl PumpTargets {
    pub(crate) fn merge(
        &mut self,
        contexts: Vec<K8sContext>,
        persister: Option<Arc<dyn Persister>>,
    ) {
        for ctx in contexts {
            if !self.contexts.iter().any(|known| known.id == ctx.id) {
                self.contexts.push(ctx);
            }
        }
        if self.persister.is_none() {
            self.persister = persister;
        }
    }
}

struct BrokerChannel {
    tx: mpsc::Sender<Message>,
    rx: Option<mpsc::Receiver<Message>>,
}

/// Process-wide MeshSync controller
pub struct SyncController {
    pub(crate) config: ControllerConfig,
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) broker: BrokerConnection,
    pub(crate) operator: Arc<dyn OperatorClientFactory>,
    pub(crate) bus: Broadcast,
    pub(crate) liveness: Liveness,
    broker_channel: Mutex<Option<BrokerChannel>>,
    pub(crate) meshsync_tx: mpsc::Sender<MeshSyncSignal>,
    meshsync_rx: Mutex<Option<mpsc::Receiver<MeshSyncSignal>>>,
    pub(crate) operator_sync: broadcast::Sender<SyncPing>,
    pub(crate) control_plane_sync: broadcast::Sender<SyncPing>,
    pub(crate) pump_targets: watch::Sender<PumpTargets>,
    pump_started: AtomicBool,
    install_signalled: AtomicBool,
    pub(crate) shutdown: CancellationToken,
}

impl SyncController {
    pub fn new(
        config: ControllerConfig,
        registry: Arc<ConnectionRegistry>,
        operator: Arc<dyn OperatorClientFactory>,
        dialer: Arc<dyn BrokerDialer>,
    ) -> Self {
        let (meshsync_tx, meshsync_rx) = mpsc::channel(PUMP_CHANNEL_CAPACITY);
        let (operator_sync, _) = broadcast::channel(SYNC_PING_CAPACITY);
        let (control_plane_sync, _) = broadcast::channel(SYNC_PING_CAPACITY);
        let bus = Broadcast::new(config.bus_capacity);
        let (pump_targets, _) = watch::channel(PumpTargets::default());

        Self {
            config,
            registry,
            broker: BrokerConnection::new(dialer),
            operator,
            bus,
            liveness: Liveness::new(),
            broker_channel: Mutex::new(None),
            meshsync_tx,
            meshsync_rx: Mutex::new(Some(meshsync_rx)),
            operator_sync,
            control_plane_sync,
            pump_targets,
            pump_started: AtomicBool::new(false),
            install_signalled: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn broker(&self) -> &BrokerConnection {
        &self.broker
    }

    pub fn bus(&self) -> &Broadcast {
        &self.bus
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Pings for changes to the operator's own objects
    pub fn subscribe_operator_sync(&self) -> broadcast::Receiver<SyncPing> {
        self.operator_sync.subscribe()
    }

    /// Pings for objects in mesh control-plane namespaces
    pub fn subscribe_control_plane_sync(&self) -> broadcast::Receiver<SyncPing> {
        self.control_plane_sync.subscribe()
    }

    /// Stop the event pump and every status loop
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Sender side of the broker message channel, allocating it on first use
    pub(crate) async fn broker_sender(&self) -> mpsc::Sender<Message> {
        let mut channel = self.broker_channel.lock().await;
        channel
            .get_or_insert_with(|| {
                let (tx, rx) = mpsc::channel(PUMP_CHANNEL_CAPACITY);
                BrokerChannel { tx, rx: Some(rx) }
            })
            .tx
            .clone()
    }

    pub(crate) async fn take_broker_receiver(&self) -> Option<mpsc::Receiver<Message>> {
        self.broker_sender().await;
        self.broker_channel
            .lock()
            .await
            .as_mut()
            .and_then(|channel| channel.rx.take())
    }

    pub(crate) async fn take_meshsync_receiver(&self) -> Option<mpsc::Receiver<MeshSyncSignal>> {
        self.meshsync_rx.lock().await.take()
    }

    /// True exactly once, for the caller that gets to start the pump
    pub(crate) fn claim_pump_start(&self) -> bool {
        self.pump_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn pump_started(&self) -> bool {
        self.pump_started.load(Ordering::SeqCst)
    }

    /// True exactly once, for the caller that sends the install token
    pub(crate) fn claim_install_signal(&self) -> bool {
        self.install_signalled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl fmt::Debug for SyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncController")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("broker", &self.broker)
            .field("pump_started", &self.pump_started())
            .finish_non_exhaustive()
    }
}
