/// Deployment switches consulted by the lifecycle core
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait DeploymentEnvironment: Send + Sync {
    /// Quota-restricted ("cloud") deployment: the removed-device ledger is kept
    fn is_cloud(&self) -> bool;

    /// Process-wide billing switch; usage is only reported when this is on
    /// and the namespace has an active subscription
    fn is_billing_enabled(&self) -> bool;
}
