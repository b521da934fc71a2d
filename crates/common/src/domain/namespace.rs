use crate::domain::result::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sentinel for `max_devices` meaning the namespace has no device ceiling
pub const UNLIMITED_DEVICES: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Administrator,
    Operator,
    Observer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub role: MemberRole,
}

/// Billing subscription attached to a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Billing {
    pub active: bool,
}

/// Tenant grouping devices and users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub tenant_id: String,
    pub name: String,
    pub owner: String,
    pub members: Vec<Member>,
    /// Device ceiling; [`UNLIMITED_DEVICES`] disables it
    pub max_devices: i64,
    /// Accepted devices, maintained by the store. Read-only for the core.
    pub devices_count: i64,
    pub billing: Option<Billing>,
}

impl Namespace {
    pub fn has_unlimited_devices(&self) -> bool {
        self.max_devices < 0
    }

    pub fn has_active_billing(&self) -> bool {
        self.billing.as_ref().is_some_and(|billing| billing.active)
    }

    /// Slots left before the ceiling, `None` when unlimited
    pub fn available_devices(&self) -> Option<i64> {
        if self.has_unlimited_devices() {
            None
        } else {
            Some(self.max_devices - self.devices_count)
        }
    }

    /// Whether accepted devices plus devices held in the removed ledger
    /// reach the ceiling
    pub fn has_max_devices_reached(&self, removed_count: u64) -> bool {
        if self.has_unlimited_devices() {
            return false;
        }

        let removed = i64::try_from(removed_count).unwrap_or(i64::MAX);
        self.devices_count.saturating_add(removed) >= self.max_devices
    }
}

/// Repository trait for namespace reads
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NamespaceRepository: Send + Sync {
    async fn get_namespace(&self, tenant_id: &str) -> StoreResult<Option<Namespace>>;
}
