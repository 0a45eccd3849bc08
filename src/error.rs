// Error Types
//
// Errors surfaced by storage backends. The `Storage` facade catches these and
// degrades to defaults, so they rarely travel further than one call.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage area unavailable: {0}")]
    Unavailable(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
