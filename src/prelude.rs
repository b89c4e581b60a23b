pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};

pub use crate::metrics::{Labels, Telemetry};
pub use crate::options::{Command, Options};
pub use crate::server::Server;
pub use crate::timestamp::Timestamp;
