//! Core utilities for the kspshift migration tools
//!
//! This crate provides shared functionality used by the kspshift CLI and the
//! Gradle migration engine:
//!
//! - **Error handling**: structured errors with codes, context, and recovery suggestions
//! - **File scanning**: build-script discovery with filtering
//! - **Configuration**: TOML-based project configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use kspshift_core::{config::Config, file_scanner::scan_gradle_scripts};
//! use std::path::Path;
//!
//! let config = Config::load(None).expect("config");
//! let scripts = scan_gradle_scripts(Path::new("."), &config.schema.scan.exclude)
//!     .expect("scan failed");
//!
//! for script in scripts {
//!     println!("{}", script.display());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod file_scanner;

pub use error::{Error, ErrorCode, Result, ResultExt};
