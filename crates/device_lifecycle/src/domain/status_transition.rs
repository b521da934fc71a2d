use crate::domain::{IdentityReconciler, QuotaResolver, UsageReporting};
use common::domain::{
    Device, DeviceRepository, DeviceStatus, DomainError, DomainResult, GetDeviceRepoInput,
    Namespace, NamespaceRepository, UpdateDeviceStatusRepoInput,
};
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Request to move a pending device to a new status
#[derive(Debug, Clone, Validate)]
pub struct UpdatePendingStatusRequest {
    #[garde(length(min = 1))]
    pub tenant_id: String,
    #[garde(length(min = 1))]
    pub uid: String,
    /// Raw status value as received by the caller
    #[garde(skip)]
    pub status: String,
}

/// Applies status transitions, enforcing quota on acceptance
pub struct StatusTransitionEngine {
    devices: Arc<dyn DeviceRepository>,
    namespaces: Arc<dyn NamespaceRepository>,
    quota: QuotaResolver,
    reconciler: IdentityReconciler,
    usage: UsageReporting,
}

impl StatusTransitionEngine {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        namespaces: Arc<dyn NamespaceRepository>,
        quota: QuotaResolver,
        reconciler: IdentityReconciler,
        usage: UsageReporting,
    ) -> Self {
        Self {
            devices,
            namespaces,
            quota,
            reconciler,
            usage,
        }
    }

    /// Move a device out of pending.
    ///
    /// Accepting runs quota admission, identity reconciliation and the status
    /// write in that order, then reports usage once the write has committed.
    /// Rejecting only persists the status.
    #[instrument(skip(self, request), fields(tenant_id = %request.tenant_id, uid = %request.uid, status = %request.status))]
    pub async fn update_pending_status(
        &self,
        request: UpdatePendingStatusRequest,
    ) -> DomainResult<Device> {
        // Reject unknown status values before touching the store
        let target: DeviceStatus = request.status.parse()?;

        // Validate request using garde
        common::garde::validate(&request)?;

        let device = match self
            .devices
            .get_device_by_uid(GetDeviceRepoInput {
                uid: request.uid.clone(),
                tenant_id: request.tenant_id.clone(),
            })
            .await
        {
            Ok(Some(device)) => device,
            Ok(None) => {
                return Err(DomainError::DeviceNotFound {
                    uid: request.uid,
                    source: None,
                });
            }
            Err(e) => {
                return Err(DomainError::DeviceNotFound {
                    uid: request.uid,
                    source: Some(e),
                });
            }
        };

        // Accepted devices only leave that state through deletion
        if device.status == DeviceStatus::Accepted {
            return Err(DomainError::DeviceAlreadyAccepted);
        }

        if !device.status.can_transition_to(target) {
            return Err(DomainError::InvalidStatusTransition {
                from: device.status,
                to: target,
            });
        }

        match target {
            DeviceStatus::Accepted => self.accept(device).await,
            other => self.persist_status(device, other).await,
        }
    }

    async fn accept(&self, mut device: Device) -> DomainResult<Device> {
        let namespace = self.namespace(&device.tenant_id).await?;

        let admission = self.quota.admit(&namespace, &device.uid).await?;
        debug!(?admission, "device admitted");

        // Same hardware under an older uid keeps its name
        if let Some(retired) = self.reconciler.reconcile(&device).await? {
            device.name = retired.name;
        }

        let device = self.persist_status(device, DeviceStatus::Accepted).await?;

        // Billing only sees the increment once the status is stored
        self.usage.report(&device, &namespace, true).await?;

        info!(name = %device.name, "device accepted");
        Ok(device)
    }

    async fn persist_status(&self, mut device: Device, status: DeviceStatus) -> DomainResult<Device> {
        self.devices
            .update_device_status(UpdateDeviceStatusRepoInput {
                uid: device.uid.clone(),
                status,
            })
            .await?;

        device.status = status;
        Ok(device)
    }

    async fn namespace(&self, tenant_id: &str) -> DomainResult<Namespace> {
        match self.namespaces.get_namespace(tenant_id).await {
            Ok(Some(namespace)) => Ok(namespace),
            Ok(None) => Err(DomainError::NamespaceNotFound {
                tenant_id: tenant_id.to_string(),
                source: None,
            }),
            Err(e) => Err(DomainError::NamespaceNotFound {
                tenant_id: tenant_id.to_string(),
                source: Some(e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::{Billing, DeviceRemoved, StoreError, UsageRecord};
    use common::{
        MockClock, MockDeploymentEnvironment, MockDeviceRepository, MockNamespaceRepository,
        MockRemovedDeviceRepository, MockSessionRepository, MockUsageReporter,
    };
    use mockall::Sequence;
    use std::collections::BTreeSet;

    struct Mocks {
        devices: MockDeviceRepository,
        namespaces: MockNamespaceRepository,
        removed: MockRemovedDeviceRepository,
        sessions: MockSessionRepository,
        reporter: MockUsageReporter,
        cloud: bool,
        billing: bool,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                devices: MockDeviceRepository::new(),
                namespaces: MockNamespaceRepository::new(),
                removed: MockRemovedDeviceRepository::new(),
                sessions: MockSessionRepository::new(),
                reporter: MockUsageReporter::new(),
                cloud: true,
                billing: true,
            }
        }

        fn engine(self) -> StatusTransitionEngine {
            let (cloud, billing) = (self.cloud, self.billing);
            let mut env = MockDeploymentEnvironment::new();
            env.expect_is_cloud().returning(move || cloud);
            env.expect_is_billing_enabled().returning(move || billing);
            let env = Arc::new(env);

            let mut clock = MockClock::new();
            clock.expect_now().returning(Utc::now);

            let devices: Arc<dyn DeviceRepository> = Arc::new(self.devices);
            StatusTransitionEngine::new(
                devices.clone(),
                Arc::new(self.namespaces),
                QuotaResolver::new(Arc::new(self.removed), env.clone()),
                IdentityReconciler::new(devices, Arc::new(self.sessions)),
                UsageReporting::new(Arc::new(self.reporter), Arc::new(clock), env),
            )
        }
    }

    fn device(status: DeviceStatus, mac: Option<&str>) -> Device {
        Device {
            uid: "uid".to_string(),
            tenant_id: "tenant".to_string(),
            name: "sensor".to_string(),
            mac: mac.map(str::to_string),
            status,
            online: false,
            last_seen: None,
            position: None,
            tags: BTreeSet::new(),
            created_at: None,
        }
    }

    fn namespace(max_devices: i64, devices_count: i64, billing: bool) -> Namespace {
        Namespace {
            tenant_id: "tenant".to_string(),
            name: "namespace".to_string(),
            owner: "owner".to_string(),
            members: vec![],
            max_devices,
            devices_count,
            billing: Some(Billing { active: billing }),
        }
    }

    fn request(status: &str) -> UpdatePendingStatusRequest {
        UpdatePendingStatusRequest {
            tenant_id: "tenant".to_string(),
            uid: "uid".to_string(),
            status: status.to_string(),
        }
    }

    fn store_error() -> StoreError {
        StoreError::Backend(anyhow::anyhow!("store unavailable"))
    }

    #[tokio::test]
    async fn test_invalid_status_rejected_before_lookup() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_get_device_by_uid().times(0);

        let result = mocks.engine().update_pending_status(request("banned")).await;
        assert!(matches!(result, Err(DomainError::InvalidDeviceStatus(s)) if s == "banned"));
    }

    #[tokio::test]
    async fn test_empty_uid_fails_validation() {
        let mut mocks = Mocks::new();
        mocks.devices.expect_get_device_by_uid().times(0);

        let mut req = request("accepted");
        req.uid = String::new();

        let result = mocks.engine().update_pending_status(req).await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_device_not_found() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .withf(|input: &GetDeviceRepoInput| input.uid == "uid" && input.tenant_id == "tenant")
            .times(1)
            .return_once(|_| Ok(None));

        let result = mocks.engine().update_pending_status(request("accepted")).await;
        assert!(matches!(
            result,
            Err(DomainError::DeviceNotFound { source: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_device_fetch_error_is_not_found_with_cause() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Err(store_error()));

        let result = mocks.engine().update_pending_status(request("accepted")).await;
        assert!(matches!(
            result,
            Err(DomainError::DeviceNotFound { source: Some(_), .. })
        ));
    }

    #[tokio::test]
    async fn test_already_accepted() {
        for target in ["accepted", "pending", "rejected"] {
            let mut mocks = Mocks::new();
            mocks
                .devices
                .expect_get_device_by_uid()
                .times(1)
                .return_once(|_| Ok(Some(device(DeviceStatus::Accepted, None))));
            mocks.devices.expect_update_device_status().times(0);

            let result = mocks.engine().update_pending_status(request(target)).await;
            assert!(matches!(result, Err(DomainError::DeviceAlreadyAccepted)));
        }
    }

    #[tokio::test]
    async fn test_transition_outside_table() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Ok(Some(device(DeviceStatus::Rejected, None))));

        let result = mocks.engine().update_pending_status(request("accepted")).await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition {
                from: DeviceStatus::Rejected,
                to: DeviceStatus::Accepted
            })
        ));
    }

    #[tokio::test]
    async fn test_reject_persists_without_quota_or_billing() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Ok(Some(device(DeviceStatus::Pending, None))));
        mocks
            .devices
            .expect_update_device_status()
            .withf(|input: &UpdateDeviceStatusRepoInput| {
                input.uid == "uid" && input.status == DeviceStatus::Rejected
            })
            .times(1)
            .return_once(|_| Ok(()));
        mocks.namespaces.expect_get_namespace().times(0);
        mocks.reporter.expect_report_usage().times(0);

        let device = mocks
            .engine()
            .update_pending_status(request("rejected"))
            .await
            .unwrap();
        assert_eq!(device.status, DeviceStatus::Rejected);
    }

    #[tokio::test]
    async fn test_accept_missing_namespace() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Ok(Some(device(DeviceStatus::Pending, None))));
        mocks
            .namespaces
            .expect_get_namespace()
            .times(1)
            .return_once(|_| Ok(None));

        let result = mocks.engine().update_pending_status(request("accepted")).await;
        assert!(matches!(result, Err(DomainError::NamespaceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_accept_at_limit_leaves_status_untouched() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Ok(Some(device(DeviceStatus::Pending, Some("aa:bb")))));
        mocks
            .namespaces
            .expect_get_namespace()
            .times(1)
            .return_once(|_| Ok(Some(namespace(3, 3, true))));
        mocks
            .removed
            .expect_get_removed_device()
            .times(1)
            .return_once(|_| Ok(None));
        mocks.devices.expect_get_device_by_mac().times(0);
        mocks.devices.expect_update_device_status().times(0);
        mocks.reporter.expect_report_usage().times(0);

        let result = mocks.engine().update_pending_status(request("accepted")).await;
        assert!(matches!(
            result,
            Err(DomainError::DeviceLimitReached { max_devices: 3 })
        ));
    }

    #[tokio::test]
    async fn test_accept_through_grace_reports_after_write() {
        let mut seq = Sequence::new();
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Ok(Some(device(DeviceStatus::Pending, None))));
        mocks
            .namespaces
            .expect_get_namespace()
            .times(1)
            .return_once(|_| Ok(Some(namespace(3, 3, true))));
        mocks
            .removed
            .expect_get_removed_device()
            .times(1)
            .return_once(|_| {
                Ok(Some(DeviceRemoved {
                    tenant_id: "tenant".to_string(),
                    uid: "uid".to_string(),
                }))
            });
        mocks
            .removed
            .expect_delete_removed_device()
            .times(1)
            .return_once(|_| Ok(()));
        mocks.removed.expect_count_removed_devices().times(0);
        mocks
            .devices
            .expect_update_device_status()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|_| Ok(()));
        mocks
            .reporter
            .expect_report_usage()
            .withf(|record: &UsageRecord| {
                record.inc && record.device.status == DeviceStatus::Accepted
            })
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|_| Ok(200));

        let device = mocks
            .engine()
            .update_pending_status(request("accepted"))
            .await
            .unwrap();
        assert_eq!(device.status, DeviceStatus::Accepted);
    }

    #[tokio::test]
    async fn test_accept_unlimited_merges_previous_identity() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Ok(Some(device(DeviceStatus::Pending, Some("aa:bb")))));
        mocks
            .namespaces
            .expect_get_namespace()
            .times(1)
            .return_once(|_| Ok(Some(namespace(-1, 10, false))));
        mocks.removed.expect_get_removed_device().times(0);
        mocks
            .devices
            .expect_get_device_by_mac()
            .times(1)
            .return_once(|_| {
                let mut old = device(DeviceStatus::Accepted, Some("aa:bb"));
                old.uid = "old".to_string();
                old.name = "boiler".to_string();
                Ok(Some(old))
            });
        mocks
            .sessions
            .expect_update_session_device_uid()
            .times(1)
            .return_once(|_| Ok(()));
        mocks
            .devices
            .expect_delete_device()
            .withf(|uid: &str| uid == "old")
            .times(1)
            .return_once(|_| Ok(()));
        mocks
            .devices
            .expect_rename_device()
            .times(1)
            .return_once(|_| Ok(()));
        mocks
            .devices
            .expect_update_device_status()
            .times(1)
            .return_once(|_| Ok(()));
        mocks.reporter.expect_report_usage().times(0);

        let device = mocks
            .engine()
            .update_pending_status(request("accepted"))
            .await
            .unwrap();
        assert_eq!(device.name, "boiler");
        assert_eq!(device.status, DeviceStatus::Accepted);
    }

    #[tokio::test]
    async fn test_accept_aborts_when_reconcile_rename_fails() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Ok(Some(device(DeviceStatus::Pending, Some("aa:bb")))));
        mocks
            .namespaces
            .expect_get_namespace()
            .times(1)
            .return_once(|_| Ok(Some(namespace(-1, 4, true))));
        mocks
            .devices
            .expect_get_device_by_mac()
            .times(1)
            .return_once(|_| {
                let mut old = device(DeviceStatus::Accepted, Some("aa:bb"));
                old.uid = "old".to_string();
                Ok(Some(old))
            });
        mocks
            .sessions
            .expect_update_session_device_uid()
            .times(1)
            .return_once(|_| Ok(()));
        mocks
            .devices
            .expect_delete_device()
            .times(1)
            .return_once(|_| Ok(()));
        mocks
            .devices
            .expect_rename_device()
            .times(1)
            .return_once(|_| Err(store_error()));
        mocks.devices.expect_update_device_status().times(0);
        mocks.reporter.expect_report_usage().times(0);

        let result = mocks.engine().update_pending_status(request("accepted")).await;
        assert!(matches!(result, Err(DomainError::Store(_))));
    }

    #[tokio::test]
    async fn test_accept_billing_failure_after_write() {
        let mut mocks = Mocks::new();
        mocks.cloud = false;
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Ok(Some(device(DeviceStatus::Pending, None))));
        mocks
            .namespaces
            .expect_get_namespace()
            .times(1)
            .return_once(|_| Ok(Some(namespace(3, 0, true))));
        mocks
            .devices
            .expect_update_device_status()
            .times(1)
            .return_once(|_| Ok(()));
        mocks
            .reporter
            .expect_report_usage()
            .times(1)
            .return_once(|_| Ok(402));

        let result = mocks.engine().update_pending_status(request("accepted")).await;
        assert!(matches!(
            result,
            Err(DomainError::UsageReportFailed { status: 402 })
        ));
    }

    #[tokio::test]
    async fn test_status_write_error_is_returned_verbatim() {
        let mut mocks = Mocks::new();
        mocks
            .devices
            .expect_get_device_by_uid()
            .times(1)
            .return_once(|_| Ok(Some(device(DeviceStatus::Pending, None))));
        mocks
            .devices
            .expect_update_device_status()
            .times(1)
            .return_once(|_| Err(store_error()));

        let result = mocks.engine().update_pending_status(request("rejected")).await;
        assert!(matches!(result, Err(DomainError::Store(_))));
    }
}
