pub mod inband_manager;
pub mod local;
pub mod remote;

pub use inband_manager::{InBandConnectionManager, InBandTarget};
pub use local::LocalShell;
pub use remote::{RemoteShell, SshConnectionParams};
