use crate::domain::result::{DomainError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Admission state of a device within its namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Pending,
    Accepted,
    Rejected,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Pending => "pending",
            DeviceStatus::Accepted => "accepted",
            DeviceStatus::Rejected => "rejected",
        }
    }

    /// Whether the state machine has an edge from `self` to `target`.
    /// Only pending devices move; accepted and rejected leave through deletion.
    pub fn can_transition_to(&self, target: DeviceStatus) -> bool {
        match (self, target) {
            (DeviceStatus::Pending, DeviceStatus::Accepted) => true,
            (DeviceStatus::Pending, DeviceStatus::Rejected) => true,
            (DeviceStatus::Pending, DeviceStatus::Pending) => false,
            (DeviceStatus::Accepted, _) => false,
            (DeviceStatus::Rejected, _) => false,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeviceStatus::Pending),
            "accepted" => Ok(DeviceStatus::Accepted),
            "rejected" => Ok(DeviceStatus::Rejected),
            other => Err(DomainError::InvalidDeviceStatus(other.to_string())),
        }
    }
}

/// Geographic position of a device
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DevicePosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Domain representation of a Device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub uid: String,
    pub tenant_id: String,
    pub name: String,
    /// Hardware identity; stable for a physical unit across re-provisioning
    pub mac: Option<String>,
    pub status: DeviceStatus,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub position: Option<DevicePosition>,
    pub tags: BTreeSet<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Pagination window for device listings (1-based page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Contains,
}

/// Filter applied by the store when listing devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    /// Compare a device property (`name`, `mac`, `online`) against a value
    Property {
        name: String,
        operator: FilterOperator,
        value: String,
    },
    /// Device carries the tag
    Tag(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceSortField {
    #[default]
    Name,
    CreatedAt,
    LastSeen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Annotation passed to the store and returned to the presentation layer
/// when listing devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceListMode {
    Default,
    MaxDeviceReached,
}

/// Input for getting a device scoped to a tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDeviceRepoInput {
    pub uid: String,
    pub tenant_id: String,
}

/// Input for getting a device by its display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDeviceByNameRepoInput {
    pub name: String,
    pub tenant_id: String,
}

/// Input for getting a device by hardware identity and status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDeviceByMacRepoInput {
    pub mac: String,
    pub tenant_id: String,
    pub status: DeviceStatus,
}

/// Input for resolving a device by namespace name and device name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupDeviceRepoInput {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDevicesRepoInput {
    pub tenant_id: String,
    pub pagination: Pagination,
    pub filters: Vec<DeviceFilter>,
    pub status: Option<DeviceStatus>,
    pub sort: DeviceSortField,
    pub order: SortOrder,
    pub mode: DeviceListMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameDeviceRepoInput {
    pub uid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDeviceStatusRepoInput {
    pub uid: String,
    pub status: DeviceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDeviceOnlineRepoInput {
    pub uid: String,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetDevicePositionRepoInput {
    pub uid: String,
    pub position: DevicePosition,
}

/// One page of devices plus the total number of matches
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePage {
    pub devices: Vec<Device>,
    pub total: usize,
}

/// Repository trait for device storage operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Get a device by UID regardless of tenant
    async fn get_device(&self, uid: &str) -> StoreResult<Option<Device>>;

    /// Get a device by UID within a tenant
    async fn get_device_by_uid(&self, input: GetDeviceRepoInput) -> StoreResult<Option<Device>>;

    async fn get_device_by_name(
        &self,
        input: GetDeviceByNameRepoInput,
    ) -> StoreResult<Option<Device>>;

    async fn get_device_by_mac(&self, input: GetDeviceByMacRepoInput)
    -> StoreResult<Option<Device>>;

    async fn lookup_device(&self, input: LookupDeviceRepoInput) -> StoreResult<Option<Device>>;

    async fn list_devices(&self, input: ListDevicesRepoInput) -> StoreResult<DevicePage>;

    async fn delete_device(&self, uid: &str) -> StoreResult<()>;

    async fn rename_device(&self, input: RenameDeviceRepoInput) -> StoreResult<()>;

    /// Persist a status change; the store maintains the namespace device counter
    async fn update_device_status(&self, input: UpdateDeviceStatusRepoInput) -> StoreResult<()>;

    async fn set_device_online(&self, input: SetDeviceOnlineRepoInput) -> StoreResult<()>;

    async fn set_device_position(&self, input: SetDevicePositionRepoInput) -> StoreResult<()>;
}
