use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meshsync_controller::broadcast::MessageType;
use meshsync_controller::broker::{Broker, EventType, MemoryBroker, Message, MESHSYNC_SUBJECT};
use meshsync_controller::controller::{ConnectionRegistry, ControllerConfig, SyncController};
use meshsync_controller::liveness::Liveness;
use meshsync_controller::model::{
    K8sContext, KubeHandler, OperatorControllerStatus, RequestContext, ResyncActions, Status,
};
use meshsync_controller::operator::{
    KubeOperatorFactory, OperatorClient, OperatorClientFactory, MESHSYNC_CONTROLLER_NAME,
};
use meshsync_controller::persist::{DiscoveryTable, MemoryPersister, Persister, StaticProvider};
use serde_json::json;
use tokio::time::{sleep, timeout};

const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: kind-e2e
  cluster:
    server: https://127.0.0.1:6443
    insecure-skip-tls-verify: true
contexts:
- name: kind-e2e
  context:
    cluster: kind-e2e
    user: admin
users:
- name: admin
  user:
    token: e2e-token
current-context: kind-e2e
"#;

const ENDPOINT: &str = "nats://meshery-broker.meshery:4222";

/// Operator that always reports MeshSync as enabled with a fixed broker
struct ReadyOperator;

impl OperatorClientFactory for ReadyOperator {
    fn client_for(
        &self,
        _handler: &KubeHandler,
    ) -> meshsync_controller::Result<Arc<dyn OperatorClient>> {
        Ok(Arc::new(ReadyOperator))
    }
}

#[async_trait]
impl OperatorClient for ReadyOperator {
    async fn meshsync_info(
        &self,
        _liveness: &Liveness,
    ) -> meshsync_controller::Result<OperatorControllerStatus> {
        Ok(OperatorControllerStatus::new(
            MESHSYNC_CONTROLLER_NAME,
            "v0.6.0",
            Status::Enabled,
        ))
    }

    async fn broker_endpoint(&self) -> meshsync_controller::Result<Option<String>> {
        Ok(Some(ENDPOINT.to_string()))
    }
}

async fn load_contexts() -> Vec<K8sContext> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(KUBECONFIG.as_bytes()).unwrap();
    K8sContext::load_from_path(file.path(), &[]).await.unwrap()
}

#[tokio::test]
async fn test_discovery_flow_through_public_api() {
    let contexts = load_contexts().await;
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].kubernetes_server_id, "https://127.0.0.1:6443/");

    let broker = MemoryBroker::new();
    let store = Arc::new(MemoryPersister::new());
    let provider = Arc::new(StaticProvider::new(store.clone()));
    let controller = Arc::new(SyncController::new(
        ControllerConfig::default(),
        Arc::new(ConnectionRegistry::new()),
        Arc::new(ReadyOperator),
        Arc::new(broker.clone()),
    ));
    let mut bus = controller.bus().subscribe();

    let req = RequestContext::new().with_kube_clusters(contexts.clone());
    let status = controller
        .connect_to_nats(&req, &contexts[0].id)
        .await
        .unwrap();
    assert_eq!(status, Status::Connected);
    assert_eq!(controller.registry().get(&contexts[0].id), ENDPOINT);
    assert_eq!(bus.recv().await.unwrap().kind, MessageType::Health);

    let mut statuses = controller
        .listen_to_meshsync_events(req, provider.clone())
        .await
        .unwrap();
    assert_eq!(statuses.recv().await.unwrap().status, Status::Enabled);

    let object = json!({
        "id": "svc-1",
        "kind": "Service",
        "apiVersion": "v1",
        "cluster_id": "https://127.0.0.1:6443/",
        "metadata": {"name": "productpage", "namespace": "bookinfo"}
    });
    broker
        .publish(MESHSYNC_SUBJECT, &Message::discovery(EventType::Add, object))
        .await
        .unwrap();

    timeout(Duration::from_secs(5), async {
        while store.cluster_name_of("svc-1").await.as_deref() != Some("kind-e2e") {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("discovery object persisted and stamped");

    let status = controller
        .resync(
            &*provider,
            ResyncActions {
                clear_db: true,
                re_sync: true,
                force: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(status, Status::Processing);
    assert_eq!(store.count(DiscoveryTable::Object).await.unwrap(), 0);
    assert_eq!(
        broker
            .published(meshsync_controller::broker::REQUEST_SUBJECT)
            .await
            .len(),
        1
    );

    controller.shutdown();
}

// Run with: cargo test --test controller_e2e -- --ignored
// Needs a cluster with the Meshery operator installed in the current kubeconfig context.
#[tokio::test]
#[ignore]
async fn e2e_probe_live_operator() {
    let kubeconfig = match kube::config::Kubeconfig::read() {
        Ok(kubeconfig) => kubeconfig,
        Err(e) => {
            eprintln!("Skipping e2e test: no kubeconfig ({e})");
            return;
        }
    };
    let Some(current) = kubeconfig.current_context.clone() else {
        eprintln!("Skipping e2e test: no current context");
        return;
    };

    let contexts = K8sContext::load_all(&kubeconfig, &[current]).await.unwrap();
    let controller = SyncController::new(
        ControllerConfig::default(),
        Arc::new(ConnectionRegistry::new()),
        Arc::new(KubeOperatorFactory::default()),
        Arc::new(MemoryBroker::new()),
    );

    let status = controller.status(&contexts[0]).await;
    assert!(
        matches!(status.status, Status::Enabled | Status::Connected),
        "MeshSync not running: {:?}",
        status
    );
}
