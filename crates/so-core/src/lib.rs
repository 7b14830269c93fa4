//! # so-core
//!
//! Core types and error definitions for simopt-rs.
//!
//! This crate provides the foundational building blocks shared across all
//! other crates in the workspace: numeric type aliases, the error hierarchy
//! with its `ensure!` macro, and declarative factor validation.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Public modules ───────────────────────────────────────────────────────────

/// Error types and the `ensure!` macro.
pub mod errors;

/// Declarative `(name, predicate)` factor validation.
pub mod validation;

// ── Primitive type aliases ────────────────────────────────────────────────────

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes, indices and replication counts.
pub type Size = usize;

// ── Re-exports for convenience ────────────────────────────────────────────────

pub use errors::{Error, Result};
pub use validation::{Check, Validate};
