//! Payload protection on top of the key ring
//!
//! - [`DataProtectionProvider`]: hands out protectors per purpose
//! - [`Protector`]: protect / unprotect under a purpose chain

mod aad;
mod payload;
pub mod protector;
pub mod provider;

pub use protector::{Protector, UnprotectOutcome};
pub use provider::DataProtectionProvider;
