//! Convenience result type alias for LegiSync.

use crate::error::AppError;

/// A specialized `Result` type for LegiSync operations.
pub type AppResult<T> = Result<T, AppError>;
