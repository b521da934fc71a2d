mod clock;
mod device;
mod device_removed;
mod environment;
mod namespace;
mod position;
mod result;
mod session;
mod usage;

pub use clock::*;
pub use device::*;
pub use device_removed::*;
pub use environment::*;
pub use namespace::*;
pub use position::*;
pub use result::*;
pub use session::*;
pub use usage::*;
