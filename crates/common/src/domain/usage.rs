use crate::domain::{Device, Namespace};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Usage event sent to the billing collaborator. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub device: Device,
    pub namespace: Namespace,
    /// `true` when the billable device count grows, `false` when it shrinks
    pub inc: bool,
    /// Unix timestamp in seconds
    pub timestamp: i64,
}

/// Client for the external billing service
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UsageReporter: Send + Sync {
    /// Send a usage record and return the HTTP status the billing side answered with
    async fn report_usage(&self, record: UsageRecord) -> anyhow::Result<u16>;
}
