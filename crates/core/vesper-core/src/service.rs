//! Lifecycle trait for long-lived, stateful components.

use crate::Result;
use async_trait::async_trait;

/// A stateful, long-lived component with a start/stop lifecycle and a
/// health check. The Scheduler is the only component in this workspace that
/// implements it, but the trait is kept separate from the Scheduler itself
/// so it can be driven uniformly by whatever wires the service together.
#[async_trait]
pub trait Service: Send + Sync {
    /// A unique name for this service, used in logs and health reports.
    fn service_type(&self) -> &str;

    /// Start background work (tick loop, event funnel consumer, etc).
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Stop the service, draining in-flight work per its own policy.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Whether the service is currently running.
    fn is_running(&self) -> bool {
        false
    }

    /// Current health.
    async fn health_check(&self) -> Result<ServiceHealth> {
        Ok(ServiceHealth::Healthy)
    }
}

/// Health status reported by a [`Service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServiceHealth {
    /// Fully operational.
    Healthy,
    /// Operational but in a degraded mode (e.g. persistence backlog).
    Degraded,
    /// Not operational.
    Unhealthy,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockService;

    #[async_trait]
    impl Service for MockService {
        fn service_type(&self) -> &str {
            "mock-service"
        }
    }

    #[tokio::test]
    async fn default_health_is_healthy() {
        let service = MockService;
        assert_eq!(service.health_check().await.unwrap(), ServiceHealth::Healthy);
    }
}
