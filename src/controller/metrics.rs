//! Prometheus metrics for the MeshSync controller
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports the following metrics:
//! - `meshsync_broker_bindings_total` (counter): bind attempts labeled by result.
//! - `meshsync_registered_contexts` (gauge): contexts currently bound to a broker endpoint.
//! - `meshsync_discovery_events_total` (counter): broker messages labeled by object type and outcome.
//! - `meshsync_broadcast_messages_total` (counter): bus envelopes labeled by source and type.
//! - `meshsync_resync_total` (counter): resync actions labeled by action and result.
//! - `meshsync_status_polls_total` (counter): status polls labeled by reported status.

use std::sync::atomic::{AtomicI64, AtomicU64};

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use crate::broadcast::{BroadcastSource, MessageType};
use crate::model::Status;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResultLabels {
    /// "success" or "failure"
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct DiscoveryLabels {
    pub object_type: String,
    /// "persisted", "skipped" or "failed"
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BroadcastLabels {
    pub source: String,
    /// "health" or "error"
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResyncLabels {
    /// "clear_db" or "resync"
    pub action: String,
    pub result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatusLabels {
    pub status: String,
}

pub static BROKER_BINDINGS_TOTAL: Lazy<Family<ResultLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static REGISTERED_CONTEXTS: Lazy<Gauge<i64, AtomicI64>> = Lazy::new(Gauge::default);

pub static DISCOVERY_EVENTS_TOTAL: Lazy<Family<DiscoveryLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static BROADCAST_MESSAGES_TOTAL: Lazy<Family<BroadcastLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static RESYNC_TOTAL: Lazy<Family<ResyncLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static STATUS_POLLS_TOTAL: Lazy<Family<StatusLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "meshsync_broker_bindings",
        "Broker bind attempts by result",
        BROKER_BINDINGS_TOTAL.clone(),
    );
    registry.register(
        "meshsync_registered_contexts",
        "Kubernetes contexts bound to a broker endpoint",
        REGISTERED_CONTEXTS.clone(),
    );
    registry.register(
        "meshsync_discovery_events",
        "Broker messages handled by the event pump",
        DISCOVERY_EVENTS_TOTAL.clone(),
    );
    registry.register(
        "meshsync_broadcast_messages",
        "Envelopes submitted to the broadcast bus",
        BROADCAST_MESSAGES_TOTAL.clone(),
    );
    registry.register(
        "meshsync_resync",
        "Resync actions by result",
        RESYNC_TOTAL.clone(),
    );
    registry.register(
        "meshsync_status_polls",
        "Operator status polls by reported status",
        STATUS_POLLS_TOTAL.clone(),
    );

    registry
});

fn result_label(ok: bool) -> String {
    if ok { "success" } else { "failure" }.to_string()
}

pub fn inc_broker_binding(ok: bool) {
    BROKER_BINDINGS_TOTAL
        .get_or_create(&ResultLabels {
            result: result_label(ok),
        })
        .inc();
}

pub fn set_registered_contexts(count: usize) {
    REGISTERED_CONTEXTS.set(count as i64);
}

pub fn inc_discovery_event(object_type: &str, outcome: &str) {
    DISCOVERY_EVENTS_TOTAL
        .get_or_create(&DiscoveryLabels {
            object_type: object_type.to_string(),
            outcome: outcome.to_string(),
        })
        .inc();
}

pub fn inc_broadcast_submitted(source: BroadcastSource, kind: MessageType) {
    BROADCAST_MESSAGES_TOTAL
        .get_or_create(&BroadcastLabels {
            source: format!("{:?}", source),
            kind: format!("{:?}", kind).to_lowercase(),
        })
        .inc();
}

pub fn inc_resync(action: &str, ok: bool) {
    RESYNC_TOTAL
        .get_or_create(&ResyncLabels {
            action: action.to_string(),
            result: result_label(ok),
        })
        .inc();
}

pub fn inc_status_poll(status: Status) {
    STATUS_POLLS_TOTAL
        .get_or_create(&StatusLabels {
            status: status.as_str().to_string(),
        })
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn test_registry_encodes_registered_metrics() {
        inc_broker_binding(true);
        inc_discovery_event("meshsync-data", "persisted");
        inc_resync("clear_db", false);
        inc_status_poll(Status::Enabled);
        inc_broadcast_submitted(BroadcastSource::OperatorSyncChannel, MessageType::Health);

        let mut buffer = String::new();
        encode(&mut buffer, &REGISTRY).unwrap();

        assert!(buffer.contains("meshsync_broker_bindings_total"));
        assert!(buffer.contains("meshsync_discovery_events_total"));
        assert!(buffer.contains("status=\"ENABLED\""));
        assert!(buffer.contains("kind=\"health\""));
    }

    #[test]
    fn test_result_labels() {
        assert_eq!(result_label(true), "success");
        assert_eq!(result_label(false), "failure");
    }
}
