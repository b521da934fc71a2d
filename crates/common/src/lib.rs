pub mod config;
pub mod domain;
pub mod garde;
pub mod memory;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockClock;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeploymentEnvironment;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockLocator;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockNamespaceRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockRemovedDeviceRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockSessionRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockUsageReporter;
