use crate::domain::DeploymentEnvironment;
use crate::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LifecycleConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Service name attached to log records
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Quota-restricted deployment; enables removed-device bookkeeping
    #[serde(default)]
    pub cloud: bool,

    /// Report usage to the billing service for namespaces with an active subscription
    #[serde(default)]
    pub billing: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "device-lifecycle".to_string()
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            service_name: default_service_name(),
            cloud: false,
            billing: false,
        }
    }
}

impl LifecycleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("DEVHUB"))
            .build()?
            .try_deserialize()
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.service_name.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

impl DeploymentEnvironment for LifecycleConfig {
    fn is_cloud(&self) -> bool {
        self.cloud
    }

    fn is_billing_enabled(&self) -> bool {
        self.billing
    }
}
