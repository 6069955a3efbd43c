//! # legisync-core
//!
//! Core crate for LegiSync. Contains configuration schemas, the unified
//! error system, pagination types, and the cross-cutting traits
//! (cache tiers, cross-process advisory locks) implemented by other crates.
//!
//! This crate has **no** internal dependencies on other LegiSync crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
