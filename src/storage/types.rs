use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Failures of the persisted key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a JSON object of strings
    #[error("Store data is corrupt: {0}")]
    Corrupt(String),

    /// The backing file, existing or about to be written, exceeds the size limit
    #[error("Store file too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    /// The in-memory state could not be serialized
    #[error("Failed to serialize store data: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reasons a favorites import was rejected. The existing collection is left
/// untouched in every case.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Input is not valid JSON
    #[error("Import is not valid JSON: {0}")]
    Syntax(String),

    /// Input is valid JSON but not an array
    #[error("Import must be a JSON array of articles, found {0}")]
    NotAnArray(&'static str),

    /// An array element is not an article
    #[error("Item {index} is not a valid article: {reason}")]
    InvalidItem { index: usize, reason: String },

    /// The parsed collection could not be persisted
    #[error("Failed to save imported favorites: {0}")]
    Store(#[from] StoreError),
}

/// Name of a JSON value's type, for error messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
