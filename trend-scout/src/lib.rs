//! trend-scout library crate.
//!
//! This module exposes the core functionality for integration testing.

pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
