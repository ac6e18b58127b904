//! # ReadAloud Common Library
//!
//! Shared code for the ReadAloud services including:
//! - Error and result types
//! - Bootstrap configuration loading (TOML file, environment, defaults)
//! - Config file and data folder resolution
//! - Logging initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
