//! Tests for the operator probe

#[cfg(test)]
mod tests {
    use crate::controller::test_support::{unreachable_context, Harness};
    use crate::error::Error;
    use crate::model::{test_context, RequestContext, Status};

    #[tokio::test]
    async fn test_enabled_status_is_returned_verbatim() {
        let harness = Harness::new();
        let status = harness.controller.status(&test_context("c1")).await;

        assert_eq!(status.status, Status::Enabled);
        assert_eq!(status.name, "meshsync");
        assert_eq!(status.version, "v0.6.0");
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn test_missing_kube_context_is_client_missing() {
        let harness = Harness::new();
        let status = harness.controller.status(&unreachable_context("c9")).await;

        assert_eq!(status.status, Status::Disabled);
        let error = status.error.unwrap();
        assert_eq!(error.code, Error::MesheryClientMissing.code());
        assert_eq!(error.description, Error::MesheryClientMissing.to_string());
        assert_eq!(harness.operator.info_calls(), 0);
    }

    #[tokio::test]
    async fn test_operator_client_failure_is_client_missing() {
        let harness = Harness::new();
        harness.operator.set_fail_client(true);

        let status = harness.controller.status(&test_context("c1")).await;
        assert_eq!(status.status, Status::Disabled);
        assert_eq!(
            status.error.unwrap().description,
            Error::MesheryClientMissing.to_string()
        );
    }

    #[tokio::test]
    async fn test_meshsync_info_failure_is_subscription_error() {
        let harness = Harness::new();
        harness.operator.set_fail_info(true);

        let status = harness.controller.status(&test_context("c1")).await;
        assert_eq!(status.status, Status::Disabled);
        assert!(status.name.is_empty());
        assert_eq!(
            status.error.unwrap().description,
            Error::MeshSyncSubscription.to_string()
        );
    }

    #[tokio::test]
    async fn test_probe_may_beat_liveness() {
        let harness = Harness::new();
        harness.operator.set_beat_liveness(true);

        harness.controller.status(&test_context("c1")).await;
        assert!(harness.controller.liveness().last_seen().is_some());
    }

    #[tokio::test]
    async fn test_operator_status_requires_context_in_request() {
        let harness = Harness::new();
        let err = harness
            .controller
            .operator_status(&RequestContext::new(), "c1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NilClient));

        let status = harness
            .controller
            .operator_status(&harness.request(), "c1")
            .await
            .unwrap();
        assert!(status.is_enabled());
    }
}
