//! Infrastructure error conversions

pub mod conversions;

pub use conversions::{io_failure, InfraError};
