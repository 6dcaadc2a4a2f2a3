//! # Core Runtime Module
//!
//! Provides the runtime infrastructure shared by the ordering core:
//! - Logging and tracing setup
//! - Top-level configuration
//!
//! ## Overview
//!
//! Nothing here touches storage. [`config::CoreConfig`] collects the settings
//! the service needs at startup and [`logging::init_logging`] installs the
//! `tracing` subscriber every other crate logs through.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
