use common::domain::{
    DeploymentEnvironment, DeviceListMode, DeviceRemovedRepoInput, DomainError, DomainResult,
    Namespace, RemovedDeviceRepository,
};
use std::sync::Arc;
use tracing::debug;

/// How a device was let in under the namespace ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The namespace has no ceiling
    Unlimited,
    /// A removed-ledger entry for the same device was consumed
    Grace,
    /// A free slot was available
    WithinQuota,
}

/// Decides whether a namespace can take one more accepted device.
///
/// Devices deleted inside the current billing window stay in the removed
/// ledger and keep holding their slot. Re-accepting one of them consumes
/// its entry instead of a fresh slot.
pub struct QuotaResolver {
    removed_devices: Arc<dyn RemovedDeviceRepository>,
    environment: Arc<dyn DeploymentEnvironment>,
}

impl QuotaResolver {
    pub fn new(
        removed_devices: Arc<dyn RemovedDeviceRepository>,
        environment: Arc<dyn DeploymentEnvironment>,
    ) -> Self {
        Self {
            removed_devices,
            environment,
        }
    }

    pub async fn admit(&self, namespace: &Namespace, uid: &str) -> DomainResult<Admission> {
        if namespace.has_unlimited_devices() {
            return Ok(Admission::Unlimited);
        }

        let cloud = self.environment.is_cloud();
        if cloud && self.claim_grace(namespace, uid).await? {
            debug!(uid, tenant_id = %namespace.tenant_id, "device admitted through removed ledger");
            return Ok(Admission::Grace);
        }

        self.ensure_capacity(namespace, cloud).await?;

        Ok(Admission::WithinQuota)
    }

    /// Mode the pending-device listing should run in for this namespace
    pub async fn list_mode(&self, namespace: &Namespace) -> DomainResult<DeviceListMode> {
        if namespace.has_unlimited_devices() {
            return Ok(DeviceListMode::Default);
        }

        let removed = self
            .removed_devices
            .count_removed_devices(&namespace.tenant_id)
            .await
            .map_err(DomainError::DeviceRemovedCount)?;

        if namespace.has_max_devices_reached(removed) {
            Ok(DeviceListMode::MaxDeviceReached)
        } else {
            Ok(DeviceListMode::Default)
        }
    }

    async fn claim_grace(&self, namespace: &Namespace, uid: &str) -> DomainResult<bool> {
        let input = DeviceRemovedRepoInput {
            tenant_id: namespace.tenant_id.clone(),
            uid: uid.to_string(),
        };

        let removed = self
            .removed_devices
            .get_removed_device(input.clone())
            .await
            .map_err(DomainError::DeviceRemovedGet)?;

        if removed.is_none() {
            return Ok(false);
        }

        self.removed_devices
            .delete_removed_device(input)
            .await
            .map_err(DomainError::DeviceRemovedDelete)?;

        Ok(true)
    }

    async fn ensure_capacity(&self, namespace: &Namespace, cloud: bool) -> DomainResult<()> {
        let max_devices = namespace.max_devices;

        if namespace
            .available_devices()
            .is_some_and(|available| available <= 0)
        {
            return Err(DomainError::DeviceLimitReached { max_devices });
        }

        if !cloud {
            return Ok(());
        }

        let removed = self
            .removed_devices
            .count_removed_devices(&namespace.tenant_id)
            .await
            .map_err(DomainError::DeviceRemovedCount)?;

        // Only the ledger alone counts here, unlike `has_max_devices_reached`
        // in the listing: a delete must free a slot for a different device.
        if removed >= u64::try_from(max_devices).unwrap_or(0) {
            return Err(DomainError::DeviceRemovedFull { max_devices });
        }

        Ok(())
    }
}
