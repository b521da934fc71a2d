use crate::domain::result::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Grace ledger entry for a device deleted under quota-restricted mode.
///
/// While present the device may be re-accepted without counting against
/// the namespace quota. Consumed by that re-acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRemoved {
    pub tenant_id: String,
    pub uid: String,
}

/// Input addressing one ledger entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRemovedRepoInput {
    pub tenant_id: String,
    pub uid: String,
}

/// Repository trait for the removed-device ledger
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RemovedDeviceRepository: Send + Sync {
    async fn insert_removed_device(&self, input: DeviceRemovedRepoInput) -> StoreResult<()>;

    async fn get_removed_device(
        &self,
        input: DeviceRemovedRepoInput,
    ) -> StoreResult<Option<DeviceRemoved>>;

    async fn delete_removed_device(&self, input: DeviceRemovedRepoInput) -> StoreResult<()>;

    /// Number of ledger entries held by a tenant
    async fn count_removed_devices(&self, tenant_id: &str) -> StoreResult<u64>;
}
