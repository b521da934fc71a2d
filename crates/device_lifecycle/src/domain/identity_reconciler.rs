use common::domain::{
    Device, DeviceRepository, DeviceStatus, DomainResult, GetDeviceByMacRepoInput,
    RenameDeviceRepoInput, SessionRepository, UpdateSessionDeviceUidRepoInput,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Folds an older accepted record of the same hardware into a device that is
/// being accepted.
///
/// Hardware that re-registers gets a new uid. When an accepted device in the
/// tenant already carries the same MAC, its sessions move to the new uid, the
/// old record is deleted and the new device inherits the old name. The steps
/// are not transactional; a failure part way leaves earlier steps applied.
pub struct IdentityReconciler {
    devices: Arc<dyn DeviceRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl IdentityReconciler {
    pub fn new(devices: Arc<dyn DeviceRepository>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self { devices, sessions }
    }

    /// Returns the retired record when a merge happened
    #[instrument(skip(self, device), fields(uid = %device.uid, tenant_id = %device.tenant_id))]
    pub async fn reconcile(&self, device: &Device) -> DomainResult<Option<Device>> {
        let Some(mac) = device.mac.as_deref().filter(|mac| !mac.is_empty()) else {
            debug!("device has no MAC, nothing to reconcile");
            return Ok(None);
        };

        let previous = self
            .devices
            .get_device_by_mac(GetDeviceByMacRepoInput {
                mac: mac.to_string(),
                tenant_id: device.tenant_id.clone(),
                status: DeviceStatus::Accepted,
            })
            .await?;

        let Some(previous) = previous.filter(|previous| previous.uid != device.uid) else {
            return Ok(None);
        };

        self.sessions
            .update_session_device_uid(UpdateSessionDeviceUidRepoInput {
                old_uid: previous.uid.clone(),
                new_uid: device.uid.clone(),
            })
            .await?;

        self.devices.delete_device(&previous.uid).await?;

        self.devices
            .rename_device(RenameDeviceRepoInput {
                uid: device.uid.clone(),
                name: previous.name.clone(),
            })
            .await?;

        info!(
            old_uid = %previous.uid,
            name = %previous.name,
            "merged previous device record into re-registered hardware"
        );

        Ok(Some(previous))
    }
}
