/// Domain-level error type shared across crates.
///
/// HTTP-specific mapping lives in the API crate; this enum only encodes
/// what went wrong, not how to report it.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A named entity could not be found.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}
