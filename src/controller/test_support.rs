//! Fakes and a wired-up controller for controller tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::config::ControllerConfig;
use super::registry::ConnectionRegistry;
use super::state::SyncController;
use crate::broker::MemoryBroker;
use crate::error::{Error, Result};
use crate::liveness::Liveness;
use crate::model::{
    test_context, test_kubeconfig, K8sContext, KubeHandler, OperatorControllerStatus,
    RequestContext, Status,
};
use crate::operator::{OperatorClient, OperatorClientFactory, MESHSYNC_CONTROLLER_NAME};
use crate::persist::{MemoryPersister, StaticProvider};

pub(crate) const TEST_ENDPOINT: &str = "nats://10.96.0.20:4222";

struct Script {
    status: Status,
    endpoint: Option<String>,
    fail_client: bool,
    fail_info: bool,
    beat_liveness: bool,
}

/// Scripted operator: one value serves as both factory and client
#[derive(Clone)]
pub(crate) struct FakeOperator {
    script: Arc<Mutex<Script>>,
    info_calls: Arc<AtomicU32>,
    endpoint_calls: Arc<AtomicU32>,
}

impl FakeOperator {
    pub(crate) fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                status: Status::Enabled,
                endpoint: Some(TEST_ENDPOINT.to_string()),
                fail_client: false,
                fail_info: false,
                beat_liveness: false,
            })),
            info_calls: Arc::new(AtomicU32::new(0)),
            endpoint_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn set_status(&self, status: Status) {
        self.script.lock().unwrap().status = status;
    }

    pub(crate) fn set_endpoint(&self, endpoint: Option<&str>) {
        self.script.lock().unwrap().endpoint = endpoint.map(str::to_string);
    }

    pub(crate) fn set_fail_client(&self, fail: bool) {
        self.script.lock().unwrap().fail_client = fail;
    }

    pub(crate) fn set_fail_info(&self, fail: bool) {
        self.script.lock().unwrap().fail_info = fail;
    }

    pub(crate) fn set_beat_liveness(&self, beat: bool) {
        self.script.lock().unwrap().beat_liveness = beat;
    }

    pub(crate) fn info_calls(&self) -> u32 {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn endpoint_calls(&self) -> u32 {
        self.endpoint_calls.load(Ordering::SeqCst)
    }
}

impl OperatorClientFactory for FakeOperator {
    fn client_for(&self, _handler: &KubeHandler) -> Result<Arc<dyn OperatorClient>> {
        if self.script.lock().unwrap().fail_client {
            return Err(Error::ConfigError("operator client unavailable".to_string()));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl OperatorClient for FakeOperator {
    async fn meshsync_info(&self, liveness: &Liveness) -> Result<OperatorControllerStatus> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap();
        if script.fail_info {
            return Err(Error::ConfigError("meshsync not found".to_string()));
        }
        if script.beat_liveness {
            liveness.beat();
        }
        Ok(OperatorControllerStatus::new(
            MESHSYNC_CONTROLLER_NAME,
            "v0.6.0",
            script.status,
        ))
    }

    async fn broker_endpoint(&self) -> Result<Option<String>> {
        self.endpoint_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().endpoint.clone())
    }
}

pub(crate) fn test_config() -> ControllerConfig {
    ControllerConfig {
        poll_interval: Duration::from_secs(10),
        broker_wait_attempts: 3,
        broker_wait_interval: Duration::from_millis(10),
        bus_capacity: 64,
    }
}

/// A context whose kubeconfig entry does not exist, so no client can be built
pub(crate) fn unreachable_context(id: &str) -> K8sContext {
    K8sContext::new(id, "missing", "https://10.0.0.1:6443/", test_kubeconfig())
}

pub(crate) struct Harness {
    pub(crate) controller: Arc<SyncController>,
    pub(crate) operator: FakeOperator,
    pub(crate) broker: MemoryBroker,
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) store: Arc<MemoryPersister>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(test_config())
    }

    pub(crate) fn with_config(config: ControllerConfig) -> Self {
        let operator = FakeOperator::new();
        let broker = MemoryBroker::new();
        let registry = Arc::new(ConnectionRegistry::new());
        let controller = Arc::new(SyncController::new(
            config,
            registry.clone(),
            Arc::new(operator.clone()),
            Arc::new(broker.clone()),
        ));
        Self {
            controller,
            operator,
            broker,
            registry,
            store: Arc::new(MemoryPersister::new()),
        }
    }

    /// Request scoped to the `east` context under id `c1`
    pub(crate) fn request(&self) -> RequestContext {
        RequestContext::new().with_kube_clusters(vec![test_context("c1")])
    }

    pub(crate) fn provider(&self) -> Arc<StaticProvider> {
        Arc::new(StaticProvider::new(self.store.clone()))
    }
}
