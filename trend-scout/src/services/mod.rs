//! Service layer module.
//!
//! This module builds the pipeline graph and manages its lifecycle.

pub mod container;

pub use container::{Providers, ServiceContainer};
