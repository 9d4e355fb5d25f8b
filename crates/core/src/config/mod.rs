//! Configuration loading and schema definitions
//!
//! Project-level settings shared by all kspshift commands.

mod loader;
mod schema;

pub use loader::Config;
pub use schema::*;
