/// Domain errors shared by the coordinator and the client.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed input: a bad frame, an unknown status, a missing field.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Encoding failure or broken invariant.
    #[error("Internal error: {0}")]
    Internal(String),
}
