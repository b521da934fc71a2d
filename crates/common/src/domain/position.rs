use async_trait::async_trait;
use std::net::IpAddr;

/// Position resolved by the geolocation locator
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Geolocation lookup for IP addresses
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Locator: Send + Sync {
    async fn get_position(&self, ip: IpAddr) -> anyhow::Result<Position>;
}
