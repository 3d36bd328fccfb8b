//! # Ringfence Domain
//!
//! Domain types and models for the key ring.
//!
//! This crate contains:
//! - Key identifiers, descriptors and persisted key event records
//! - The data protection error taxonomy and Result alias
//! - Key management configuration
//! - Wire-format constants
//!
//! ## Architecture
//! - Depends only on the foundation tier of `ringfence-common`
//! - Pure domain models and data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
