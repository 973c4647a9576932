//! # Spinscan Common Library
//!
//! Shared code for the spinscan services:
//! - Error types
//! - TOML bootstrap configuration loading and write-back
//! - Secret resolution (CLI → ENV → TOML)

pub mod config;
pub mod error;

pub use error::{Error, Result};
