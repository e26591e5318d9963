/// Domain-level error taxonomy shared across all crates.
///
/// `Conflict` is returned when a compare-and-set job transition loses a
/// race; callers should re-read the job rather than retry blindly.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
