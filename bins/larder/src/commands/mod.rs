//! CLI command implementations

pub mod entities;
pub mod refresh;
pub mod status;
pub mod watch;
