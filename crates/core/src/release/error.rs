use thiserror::Error;

/// Errors from building release values.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("release has no audio tracks")]
    NoAudio,
}
