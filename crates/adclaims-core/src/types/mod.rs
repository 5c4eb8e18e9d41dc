//! Core types for adclaims

mod diagnostic;
mod entry;
mod principal;

pub use diagnostic::*;
pub use entry::*;
pub use principal::*;
