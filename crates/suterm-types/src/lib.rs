//! Foundation types for suterm.
//!
//! Shared by every suterm crate: the error enum and the TOML-backed engine
//! configuration.

pub mod config;
pub mod error;
