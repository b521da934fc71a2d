mod config;
mod init;

pub use self::config::*;
pub use init::*;
