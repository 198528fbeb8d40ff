//! Configuration loading and schema definitions
//!
//! `larder.toml` sections, discovery and environment overrides.

mod loader;
mod schema;

pub use loader::{env, Config};
pub use schema::*;
