use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// A backing service the application needs before it can take traffic
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    fn name(&self) -> &'static str;

    /// Round trip to the service
    async fn ping(&self) -> Result<()>;
}

/// Shared probe handle - polymorphic over backends
pub type Probe = Arc<dyn ReadinessProbe>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeStatus {
    pub name: String,
    pub healthy: bool,
    pub error: Option<String>,
}

/// Ping every probe in order, collecting one status per probe
pub async fn check_all(probes: &[Probe]) -> Vec<ProbeStatus> {
    let mut statuses = Vec::with_capacity(probes.len());

    for probe in probes {
        let status = match probe.ping().await {
            Ok(()) => ProbeStatus {
                name: probe.name().to_string(),
                healthy: true,
                error: None,
            },
            Err(e) => {
                warn!(probe = probe.name(), error = %e, "Readiness probe failed");
                ProbeStatus {
                    name: probe.name().to_string(),
                    healthy: false,
                    error: Some(format!("{:#}", e)),
                }
            }
        };
        statuses.push(status);
    }

    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct Static {
        name: &'static str,
        up: bool,
    }

    #[async_trait]
    impl ReadinessProbe for Static {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn ping(&self) -> Result<()> {
            if !self.up {
                bail!("connection refused");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_check_all_reports_each_probe() {
        let probes: Vec<Probe> = vec![
            Arc::new(Static { name: "postgres", up: true }),
            Arc::new(Static { name: "redis", up: false }),
        ];

        let statuses = check_all(&probes).await;

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].name, "postgres");
        assert!(statuses[0].healthy);
        assert!(statuses[0].error.is_none());
        assert_eq!(statuses[1].name, "redis");
        assert!(!statuses[1].healthy);
        assert_eq!(statuses[1].error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_check_all_without_probes() {
        assert!(check_all(&[]).await.is_empty());
    }
}
