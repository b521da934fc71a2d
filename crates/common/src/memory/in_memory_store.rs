use crate::domain::{
    Device, DeviceFilter, DevicePage, DeviceRemoved, DeviceRemovedRepoInput, DeviceRepository,
    DeviceSortField, DeviceStatus, FilterOperator, GetDeviceByMacRepoInput,
    GetDeviceByNameRepoInput, GetDeviceRepoInput, ListDevicesRepoInput, LookupDeviceRepoInput,
    Namespace, NamespaceRepository, RemovedDeviceRepository, RenameDeviceRepoInput, Session,
    SessionRepository, SetDeviceOnlineRepoInput, SetDevicePositionRepoInput, SortOrder,
    StoreError, StoreResult, UpdateDeviceStatusRepoInput, UpdateSessionDeviceUidRepoInput,
};
use anyhow::anyhow;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct StoreState {
    devices: HashMap<String, Device>,
    namespaces: HashMap<String, Namespace>,
    removed: BTreeSet<(String, String)>,
    sessions: Vec<Session>,
}

impl StoreState {
    fn device_mut(&mut self, uid: &str) -> StoreResult<&mut Device> {
        self.devices
            .get_mut(uid)
            .ok_or_else(|| StoreError::Backend(anyhow!("device {uid} does not exist")))
    }

    fn adjust_devices_count(&mut self, tenant_id: &str, delta: i64) {
        if let Some(namespace) = self.namespaces.get_mut(tenant_id) {
            namespace.devices_count += delta;
        }
    }
}

/// In-memory implementation of every lifecycle repository.
///
/// Keeps `devices_count` in step with accepted devices the way a real store
/// does. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_namespace(&self, namespace: Namespace) {
        let mut state = self.state.write().await;
        state
            .namespaces
            .insert(namespace.tenant_id.clone(), namespace);
    }

    /// Insert a device as-is. Accepted devices bump the namespace counter.
    pub async fn insert_device(&self, device: Device) {
        let mut state = self.state.write().await;
        if device.status == DeviceStatus::Accepted {
            state.adjust_devices_count(&device.tenant_id, 1);
        }
        if let Some(previous) = state.devices.insert(device.uid.clone(), device) {
            if previous.status == DeviceStatus::Accepted {
                state.adjust_devices_count(&previous.tenant_id, -1);
            }
        }
    }

    pub async fn insert_session(&self, session: Session) {
        self.state.write().await.sessions.push(session);
    }

    pub async fn namespace(&self, tenant_id: &str) -> Option<Namespace> {
        self.state.read().await.namespaces.get(tenant_id).cloned()
    }

    pub async fn device(&self, uid: &str) -> Option<Device> {
        self.state.read().await.devices.get(uid).cloned()
    }

    pub async fn devices(&self, tenant_id: &str) -> Vec<Device> {
        let state = self.state.read().await;
        let mut devices: Vec<Device> = state
            .devices
            .values()
            .filter(|device| device.tenant_id == tenant_id)
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.uid.cmp(&b.uid));
        devices
    }

    pub async fn sessions_for(&self, device_uid: &str) -> Vec<Session> {
        let state = self.state.read().await;
        state
            .sessions
            .iter()
            .filter(|session| session.device_uid == device_uid)
            .cloned()
            .collect()
    }

    pub async fn is_removed(&self, tenant_id: &str, uid: &str) -> bool {
        let state = self.state.read().await;
        state
            .removed
            .contains(&(tenant_id.to_string(), uid.to_string()))
    }
}

fn matches_filter(device: &Device, filter: &DeviceFilter) -> bool {
    match filter {
        DeviceFilter::Tag(tag) => device.tags.contains(tag),
        DeviceFilter::Property {
            name,
            operator,
            value,
        } => {
            let property = match name.as_str() {
                "name" => device.name.clone(),
                "mac" => device.mac.clone().unwrap_or_default(),
                "online" => device.online.to_string(),
                _ => return false,
            };

            match operator {
                FilterOperator::Eq => property == *value,
                FilterOperator::Ne => property != *value,
                FilterOperator::Contains => property.contains(value.as_str()),
            }
        }
    }
}

fn compare_devices(a: &Device, b: &Device, sort: DeviceSortField) -> Ordering {
    match sort {
        DeviceSortField::Name => a.name.cmp(&b.name),
        DeviceSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        DeviceSortField::LastSeen => a.last_seen.cmp(&b.last_seen),
    }
    .then_with(|| a.uid.cmp(&b.uid))
}

#[async_trait]
impl DeviceRepository for InMemoryStore {
    async fn get_device(&self, uid: &str) -> StoreResult<Option<Device>> {
        Ok(self.state.read().await.devices.get(uid).cloned())
    }

    async fn get_device_by_uid(&self, input: GetDeviceRepoInput) -> StoreResult<Option<Device>> {
        let state = self.state.read().await;
        Ok(state
            .devices
            .get(&input.uid)
            .filter(|device| device.tenant_id == input.tenant_id)
            .cloned())
    }

    async fn get_device_by_name(
        &self,
        input: GetDeviceByNameRepoInput,
    ) -> StoreResult<Option<Device>> {
        let state = self.state.read().await;
        Ok(state
            .devices
            .values()
            .find(|device| device.tenant_id == input.tenant_id && device.name == input.name)
            .cloned())
    }

    async fn get_device_by_mac(
        &self,
        input: GetDeviceByMacRepoInput,
    ) -> StoreResult<Option<Device>> {
        let state = self.state.read().await;
        Ok(state
            .devices
            .values()
            .find(|device| {
                device.tenant_id == input.tenant_id
                    && device.status == input.status
                    && device.mac.as_deref() == Some(input.mac.as_str())
            })
            .cloned())
    }

    async fn lookup_device(&self, input: LookupDeviceRepoInput) -> StoreResult<Option<Device>> {
        let state = self.state.read().await;
        let Some(namespace) = state
            .namespaces
            .values()
            .find(|namespace| namespace.name == input.namespace)
        else {
            return Ok(None);
        };

        Ok(state
            .devices
            .values()
            .find(|device| device.tenant_id == namespace.tenant_id && device.name == input.name)
            .cloned())
    }

    async fn list_devices(&self, input: ListDevicesRepoInput) -> StoreResult<DevicePage> {
        // The list mode only changes how the presentation layer renders the page.
        let ListDevicesRepoInput {
            tenant_id,
            pagination,
            filters,
            status,
            sort,
            order,
            mode: _,
        } = input;

        let state = self.state.read().await;
        let mut devices: Vec<Device> = state
            .devices
            .values()
            .filter(|device| device.tenant_id == tenant_id)
            .filter(|device| status.is_none_or(|status| device.status == status))
            .filter(|device| filters.iter().all(|filter| matches_filter(device, filter)))
            .cloned()
            .collect();

        devices.sort_by(|a, b| {
            let ordering = compare_devices(a, b, sort);
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = devices.len();
        let per_page = pagination.per_page as usize;
        let skip = (pagination.page.saturating_sub(1) as usize).saturating_mul(per_page);
        let devices = devices.into_iter().skip(skip).take(per_page).collect();

        Ok(DevicePage { devices, total })
    }

    async fn delete_device(&self, uid: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let device = state
            .devices
            .remove(uid)
            .ok_or_else(|| StoreError::Backend(anyhow!("device {uid} does not exist")))?;

        if device.status == DeviceStatus::Accepted {
            state.adjust_devices_count(&device.tenant_id, -1);
        }
        Ok(())
    }

    async fn rename_device(&self, input: RenameDeviceRepoInput) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.device_mut(&input.uid)?.name = input.name;
        Ok(())
    }

    async fn update_device_status(&self, input: UpdateDeviceStatusRepoInput) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let device = state.device_mut(&input.uid)?;
        let previous = device.status;
        device.status = input.status;
        let tenant_id = device.tenant_id.clone();

        match (previous, input.status) {
            (DeviceStatus::Accepted, DeviceStatus::Accepted) => {}
            (_, DeviceStatus::Accepted) => state.adjust_devices_count(&tenant_id, 1),
            (DeviceStatus::Accepted, _) => state.adjust_devices_count(&tenant_id, -1),
            _ => {}
        }
        Ok(())
    }

    async fn set_device_online(&self, input: SetDeviceOnlineRepoInput) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let device = state.device_mut(&input.uid)?;
        device.online = input.online;
        device.last_seen = Some(input.last_seen);
        Ok(())
    }

    async fn set_device_position(&self, input: SetDevicePositionRepoInput) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.device_mut(&input.uid)?.position = Some(input.position);
        Ok(())
    }
}

#[async_trait]
impl NamespaceRepository for InMemoryStore {
    async fn get_namespace(&self, tenant_id: &str) -> StoreResult<Option<Namespace>> {
        Ok(self.state.read().await.namespaces.get(tenant_id).cloned())
    }
}

#[async_trait]
impl RemovedDeviceRepository for InMemoryStore {
    async fn insert_removed_device(&self, input: DeviceRemovedRepoInput) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.removed.insert((input.tenant_id, input.uid));
        Ok(())
    }

    async fn get_removed_device(
        &self,
        input: DeviceRemovedRepoInput,
    ) -> StoreResult<Option<DeviceRemoved>> {
        let state = self.state.read().await;
        let key = (input.tenant_id, input.uid);
        Ok(state.removed.contains(&key).then(|| DeviceRemoved {
            tenant_id: key.0.clone(),
            uid: key.1.clone(),
        }))
    }

    async fn delete_removed_device(&self, input: DeviceRemovedRepoInput) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.removed.remove(&(input.tenant_id, input.uid));
        Ok(())
    }

    async fn count_removed_devices(&self, tenant_id: &str) -> StoreResult<u64> {
        let state = self.state.read().await;
        let count = state
            .removed
            .iter()
            .filter(|(tenant, _)| tenant == tenant_id)
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn update_session_device_uid(
        &self,
        input: UpdateSessionDeviceUidRepoInput,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for session in state
            .sessions
            .iter_mut()
            .filter(|session| session.device_uid == input.old_uid)
        {
            session.device_uid = input.new_uid.clone();
        }
        Ok(())
    }
}
