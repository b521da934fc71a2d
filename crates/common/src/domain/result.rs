use crate::domain::DeviceStatus;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a repository backend.
///
/// A missing record is not a failure: getters return `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Device not found: {uid}")]
    DeviceNotFound {
        uid: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("Namespace not found: {tenant_id}")]
    NamespaceNotFound {
        tenant_id: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("Device {name} not found in namespace {namespace}")]
    DeviceLookupNotFound {
        namespace: String,
        name: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("Invalid device status: {0}")]
    InvalidDeviceStatus(String),

    #[error("Invalid device status transition from {from} to {to}")]
    InvalidStatusTransition { from: DeviceStatus, to: DeviceStatus },

    #[error("Device already accepted")]
    DeviceAlreadyAccepted,

    #[error("Device name already in use: {0}")]
    DeviceDuplicated(String),

    #[error("Device limit reached: namespace allows {max_devices} devices")]
    DeviceLimitReached { max_devices: i64 },

    #[error("Removed devices fill the namespace quota of {max_devices} devices")]
    DeviceRemovedFull { max_devices: i64 },

    #[error("Failed to get removed device")]
    DeviceRemovedGet(#[source] StoreError),

    #[error("Failed to count removed devices")]
    DeviceRemovedCount(#[source] StoreError),

    #[error("Failed to record removed device")]
    DeviceRemovedInsert(#[source] StoreError),

    #[error("Failed to delete removed device")]
    DeviceRemovedDelete(#[source] StoreError),

    #[error("Usage report failed with status {status}")]
    UsageReportFailed { status: u16 },

    #[error("Usage reporter error: {0}")]
    UsageReporter(#[source] anyhow::Error),

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Position lookup error: {0}")]
    PositionLookup(#[source] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
