use crate::domain::result::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Session recorded against a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub device_uid: String,
    pub username: String,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSessionDeviceUidRepoInput {
    pub old_uid: String,
    pub new_uid: String,
}

/// Repository trait for session ownership updates
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Move every session owned by `old_uid` to `new_uid`
    async fn update_session_device_uid(
        &self,
        input: UpdateSessionDeviceUidRepoInput,
    ) -> StoreResult<()>;
}
