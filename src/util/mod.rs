//! Utility modules

pub mod diagnostic;
pub mod logger;

pub use diagnostic::{Diagnostic, Errors, Location, Severity};
