//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the client core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration type,
//! its logging conventions and the broadcast channel through which the core
//! talks to the UI layer (notices, unread counts, connectivity changes).

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
