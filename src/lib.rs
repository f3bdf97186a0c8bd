pub mod env;
pub mod error;
pub mod health;
pub mod install;
pub mod lifecycle;
pub mod process;
pub mod supervisor;
pub mod versions;

pub use error::{GardenError, Result};
pub use health::{Endpoint, HealthChecker, HttpVersionProbe, VersionProbe};
pub use lifecycle::{start_if_not_running, with_instance, InstanceOptions};
pub use process::{ProcessInfo, ProcessTable, SystemProcessTable};
pub use supervisor::{StartOptions, SupervisedProcess};
