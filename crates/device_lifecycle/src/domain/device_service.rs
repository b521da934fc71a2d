use crate::domain::{
    IdentityReconciler, QuotaResolver, StatusTransitionEngine, UpdatePendingStatusRequest,
    UsageReporting,
};
use common::domain::{
    Clock, DeploymentEnvironment, Device, DeviceFilter, DeviceListMode, DevicePosition,
    DeviceRemovedRepoInput, DeviceRepository, DeviceSortField, DeviceStatus, DomainError,
    DomainResult, GetDeviceByNameRepoInput, GetDeviceRepoInput, ListDevicesRepoInput, Locator,
    LookupDeviceRepoInput, Namespace, NamespaceRepository, Pagination, RemovedDeviceRepository,
    RenameDeviceRepoInput, SessionRepository, SetDeviceOnlineRepoInput,
    SetDevicePositionRepoInput, SortOrder, UsageReporter,
};
use garde::Validate;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Collaborators the lifecycle service is built from
#[derive(Clone)]
pub struct DeviceServiceDeps {
    pub devices: Arc<dyn DeviceRepository>,
    pub namespaces: Arc<dyn NamespaceRepository>,
    pub removed_devices: Arc<dyn RemovedDeviceRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub usage_reporter: Arc<dyn UsageReporter>,
    pub locator: Arc<dyn Locator>,
    pub clock: Arc<dyn Clock>,
    pub environment: Arc<dyn DeploymentEnvironment>,
}

/// Service request for listing devices
#[derive(Debug, Clone, Validate)]
pub struct ListDevicesRequest {
    #[garde(length(min = 1))]
    pub tenant_id: String,
    #[garde(dive)]
    pub pagination: PageRequest,
    #[garde(skip)]
    pub filters: Vec<DeviceFilter>,
    #[garde(skip)]
    pub status: Option<DeviceStatus>,
    #[garde(skip)]
    pub sort: DeviceSortField,
    #[garde(skip)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, Validate)]
pub struct PageRequest {
    #[garde(range(min = 1))]
    pub page: u32,
    #[garde(range(min = 1, max = 100))]
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        let Pagination { page, per_page } = Pagination::default();
        Self { page, per_page }
    }
}

impl From<PageRequest> for Pagination {
    fn from(request: PageRequest) -> Self {
        Pagination {
            page: request.page,
            per_page: request.per_page,
        }
    }
}

/// One page of devices plus the mode the listing ran in
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceList {
    pub devices: Vec<Device>,
    pub total: usize,
    pub mode: DeviceListMode,
}

#[derive(Debug, Clone, Validate)]
pub struct GetDeviceRequest {
    #[garde(length(min = 1))]
    pub uid: String,
}

#[derive(Debug, Clone, Validate)]
pub struct LookupDeviceRequest {
    #[garde(length(min = 1))]
    pub namespace: String,
    #[garde(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Clone, Validate)]
pub struct DeleteDeviceRequest {
    #[garde(length(min = 1))]
    pub tenant_id: String,
    #[garde(length(min = 1))]
    pub uid: String,
}

/// Service request for renaming a device.
/// The new name is checked only when it differs from the current one.
#[derive(Debug, Clone, Validate)]
pub struct RenameDeviceRequest {
    #[garde(length(min = 1))]
    pub tenant_id: String,
    #[garde(length(min = 1))]
    pub uid: String,
    #[garde(skip)]
    pub name: String,
}

#[derive(Debug, Clone, Validate)]
pub struct UpdateDeviceStatusRequest {
    #[garde(length(min = 1))]
    pub uid: String,
    #[garde(skip)]
    pub online: bool,
}

#[derive(Debug, Clone, Validate)]
pub struct DeviceHeartbeatRequest {
    #[garde(length(min = 1))]
    pub uid: String,
}

#[derive(Debug, Clone, Validate)]
pub struct SetDevicePositionRequest {
    #[garde(length(min = 1))]
    pub uid: String,
    /// Textual IPv4 or IPv6 address the device last connected from
    #[garde(skip)]
    pub ip: String,
}

/// Domain service for the device lifecycle.
/// This is the orchestration layer that transports call.
pub struct DeviceService {
    devices: Arc<dyn DeviceRepository>,
    namespaces: Arc<dyn NamespaceRepository>,
    removed_devices: Arc<dyn RemovedDeviceRepository>,
    locator: Arc<dyn Locator>,
    clock: Arc<dyn Clock>,
    environment: Arc<dyn DeploymentEnvironment>,
    quota: QuotaResolver,
    usage: UsageReporting,
    transitions: StatusTransitionEngine,
}

impl DeviceService {
    pub fn new(deps: DeviceServiceDeps) -> Self {
        let quota = || QuotaResolver::new(deps.removed_devices.clone(), deps.environment.clone());
        let usage = || {
            UsageReporting::new(
                deps.usage_reporter.clone(),
                deps.clock.clone(),
                deps.environment.clone(),
            )
        };

        let transitions = StatusTransitionEngine::new(
            deps.devices.clone(),
            deps.namespaces.clone(),
            quota(),
            IdentityReconciler::new(deps.devices.clone(), deps.sessions.clone()),
            usage(),
        );

        Self {
            quota: quota(),
            usage: usage(),
            transitions,
            devices: deps.devices,
            namespaces: deps.namespaces,
            removed_devices: deps.removed_devices,
            locator: deps.locator,
            clock: deps.clock,
            environment: deps.environment,
        }
    }

    /// List devices in a tenant.
    /// Pending listings tell the caller whether the namespace is out of slots.
    #[instrument(skip(self, request), fields(tenant_id = %request.tenant_id, status = ?request.status))]
    pub async fn list_devices(&self, request: ListDevicesRequest) -> DomainResult<DeviceList> {
        common::garde::validate(&request)?;

        // Pending listings carry a hint when the namespace has no free slot
        let mode = if request.status == Some(DeviceStatus::Pending) {
            let namespace = self.namespace(&request.tenant_id).await?;
            self.quota.list_mode(&namespace).await?
        } else {
            DeviceListMode::Default
        };

        let page = self
            .devices
            .list_devices(ListDevicesRepoInput {
                tenant_id: request.tenant_id,
                pagination: request.pagination.into(),
                filters: request.filters,
                status: request.status,
                sort: request.sort,
                order: request.order,
                mode,
            })
            .await?;

        debug!(count = page.devices.len(), total = page.total, ?mode, "listed devices");

        Ok(DeviceList {
            devices: page.devices,
            total: page.total,
            mode,
        })
    }

    #[instrument(skip(self, request), fields(uid = %request.uid))]
    pub async fn get_device(&self, request: GetDeviceRequest) -> DomainResult<Device> {
        common::garde::validate(&request)?;

        match self.devices.get_device(&request.uid).await {
            Ok(Some(device)) => Ok(device),
            Ok(None) => Err(DomainError::DeviceNotFound {
                uid: request.uid,
                source: None,
            }),
            Err(e) => Err(DomainError::DeviceNotFound {
                uid: request.uid,
                source: Some(e),
            }),
        }
    }

    /// Resolve a device by namespace name and device name
    #[instrument(skip(self, request), fields(namespace = %request.namespace, name = %request.name))]
    pub async fn lookup_device(&self, request: LookupDeviceRequest) -> DomainResult<Device> {
        common::garde::validate(&request)?;

        let input = LookupDeviceRepoInput {
            namespace: request.namespace.clone(),
            name: request.name.clone(),
        };

        match self.devices.lookup_device(input).await {
            Ok(Some(device)) => Ok(device),
            Ok(None) => Err(DomainError::DeviceLookupNotFound {
                namespace: request.namespace,
                name: request.name,
                source: None,
            }),
            Err(e) => Err(DomainError::DeviceLookupNotFound {
                namespace: request.namespace,
                name: request.name,
                source: Some(e),
            }),
        }
    }

    /// Delete a device and release its slot.
    ///
    /// In cloud mode the device is written to the removed ledger first so it
    /// keeps holding a slot for the billing window. The decrement is reported
    /// after the delete commits; a billing failure is still returned to the
    /// caller even though the device is already gone.
    #[instrument(skip(self, request), fields(tenant_id = %request.tenant_id, uid = %request.uid))]
    pub async fn delete_device(&self, request: DeleteDeviceRequest) -> DomainResult<()> {
        common::garde::validate(&request)?;

        let device = self
            .device_in_tenant(&request.uid, &request.tenant_id)
            .await?;
        let namespace = self.namespace(&request.tenant_id).await?;

        // Hold the slot for the billing window before the record goes away
        if self.environment.is_cloud() {
            self.removed_devices
                .insert_removed_device(DeviceRemovedRepoInput {
                    tenant_id: request.tenant_id.clone(),
                    uid: request.uid.clone(),
                })
                .await
                .map_err(DomainError::DeviceRemovedInsert)?;
        }

        self.devices.delete_device(&request.uid).await?;

        if let Err(e) = self.usage.report(&device, &namespace, false).await {
            warn!(error = %e, "device deleted but usage decrement was not recorded");
            return Err(e);
        }

        info!("device deleted");
        Ok(())
    }

    /// Rename a device, keeping names unique inside the tenant
    #[instrument(skip(self, request), fields(tenant_id = %request.tenant_id, uid = %request.uid, name = %request.name))]
    pub async fn rename_device(&self, request: RenameDeviceRequest) -> DomainResult<()> {
        common::garde::validate(&request)?;

        let device = self
            .device_in_tenant(&request.uid, &request.tenant_id)
            .await?;

        // Nothing to write when the name is unchanged
        if device.name == request.name {
            debug!("name unchanged, skipping rename");
            return Ok(());
        }

        common::garde::device_name(&request.name, &())
            .map_err(|e| DomainError::ValidationError(format!("name: {}", e.message())))?;

        // Names are unique per tenant
        let existing = self
            .devices
            .get_device_by_name(GetDeviceByNameRepoInput {
                name: request.name.clone(),
                tenant_id: request.tenant_id.clone(),
            })
            .await
            .map_err(|e| DomainError::DeviceNotFound {
                uid: request.uid.clone(),
                source: Some(e),
            })?;

        if existing.is_some_and(|other| other.uid != device.uid) {
            return Err(DomainError::DeviceDuplicated(request.name));
        }

        self.devices
            .rename_device(RenameDeviceRepoInput {
                uid: request.uid,
                name: request.name,
            })
            .await?;

        Ok(())
    }

    /// Move a pending device to accepted or rejected
    pub async fn update_pending_status(
        &self,
        request: UpdatePendingStatusRequest,
    ) -> DomainResult<Device> {
        self.transitions.update_pending_status(request).await
    }

    /// Record the connectivity reported by the transport layer
    #[instrument(skip(self, request), fields(uid = %request.uid, online = request.online))]
    pub async fn update_device_status(&self, request: UpdateDeviceStatusRequest) -> DomainResult<()> {
        common::garde::validate(&request)?;

        self.mark_seen(request.uid, request.online).await
    }

    /// Keepalive from a connected device
    #[instrument(skip(self, request), fields(uid = %request.uid))]
    pub async fn device_heartbeat(&self, request: DeviceHeartbeatRequest) -> DomainResult<()> {
        common::garde::validate(&request)?;

        self.mark_seen(request.uid, true).await
    }

    /// Geolocate the device from its address and store the coordinates
    #[instrument(skip(self, request), fields(uid = %request.uid, ip = %request.ip))]
    pub async fn set_device_position(&self, request: SetDevicePositionRequest) -> DomainResult<()> {
        common::garde::validate(&request)?;

        let ip: IpAddr = request
            .ip
            .parse()
            .map_err(|_| DomainError::InvalidIpAddress(request.ip.clone()))?;

        // Resolve coordinates first so a locator failure leaves the device untouched
        let position = self
            .locator
            .get_position(ip)
            .await
            .map_err(DomainError::PositionLookup)?;

        debug!(latitude = position.latitude, longitude = position.longitude, "resolved position");

        self.devices
            .set_device_position(SetDevicePositionRepoInput {
                uid: request.uid,
                position: DevicePosition {
                    latitude: position.latitude,
                    longitude: position.longitude,
                },
            })
            .await?;

        Ok(())
    }

    async fn mark_seen(&self, uid: String, online: bool) -> DomainResult<()> {
        self.devices
            .set_device_online(SetDeviceOnlineRepoInput {
                uid,
                online,
                last_seen: self.clock.now(),
            })
            .await?;

        Ok(())
    }

    async fn device_in_tenant(&self, uid: &str, tenant_id: &str) -> DomainResult<Device> {
        let input = GetDeviceRepoInput {
            uid: uid.to_string(),
            tenant_id: tenant_id.to_string(),
        };

        match self.devices.get_device_by_uid(input).await {
            Ok(Some(device)) => Ok(device),
            Ok(None) => Err(DomainError::DeviceNotFound {
                uid: uid.to_string(),
                source: None,
            }),
            Err(e) => Err(DomainError::DeviceNotFound {
                uid: uid.to_string(),
                source: Some(e),
            }),
        }
    }

    async fn namespace(&self, tenant_id: &str) -> DomainResult<Namespace> {
        self.namespaces
            .get_namespace(tenant_id)
            .await
            .map_err(|e| DomainError::NamespaceNotFound {
                tenant_id: tenant_id.to_string(),
                source: Some(e),
            })?
            .ok_or_else(|| DomainError::NamespaceNotFound {
                tenant_id: tenant_id.to_string(),
                source: None,
            })
    }
}
