//! Core definitions (errors, results, verification macros), relied upon by all
//! tessera-* crates.

pub mod error;

pub use error::Result;
