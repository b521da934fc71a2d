use common::domain::{
    Clock, DeploymentEnvironment, Device, DomainError, DomainResult, Namespace, UsageRecord,
    UsageReporter,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Statuses the billing side answers with on success (2xx and 3xx)
fn is_success_status(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Reports billable device-count changes to the billing collaborator
pub struct UsageReporting {
    reporter: Arc<dyn UsageReporter>,
    clock: Arc<dyn Clock>,
    environment: Arc<dyn DeploymentEnvironment>,
}

impl UsageReporting {
    pub fn new(
        reporter: Arc<dyn UsageReporter>,
        clock: Arc<dyn Clock>,
        environment: Arc<dyn DeploymentEnvironment>,
    ) -> Self {
        Self {
            reporter,
            clock,
            environment,
        }
    }

    /// Billing must be switched on for the process and active on the namespace
    pub fn applies_to(&self, namespace: &Namespace) -> bool {
        namespace.has_active_billing() && self.environment.is_billing_enabled()
    }

    /// Send one usage record if billing applies to the namespace.
    ///
    /// Callers invoke this only after the state change it describes has committed.
    #[instrument(skip(self, device, namespace), fields(uid = %device.uid, tenant_id = %namespace.tenant_id))]
    pub async fn report(
        &self,
        device: &Device,
        namespace: &Namespace,
        inc: bool,
    ) -> DomainResult<()> {
        if !self.applies_to(namespace) {
            return Ok(());
        }

        // One read per report: the record and the log line share the instant.
        let now = self.clock.now();
        let record = UsageRecord {
            device: device.clone(),
            namespace: namespace.clone(),
            inc,
            timestamp: now.timestamp(),
        };

        let status = self
            .reporter
            .report_usage(record)
            .await
            .map_err(DomainError::UsageReporter)?;

        if !is_success_status(status) {
            warn!(status, inc, "billing rejected usage report");
            return Err(DomainError::UsageReportFailed { status });
        }

        debug!(status, inc, reported_at = %now, "usage reported");
        Ok(())
    }
}
