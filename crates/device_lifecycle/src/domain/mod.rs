mod device_service;
mod identity_reconciler;
mod quota_resolver;
mod status_transition;
mod usage_reporting;

pub use device_service::*;
pub use identity_reconciler::*;
pub use quota_resolver::*;
pub use status_transition::*;
pub use usage_reporting::*;
