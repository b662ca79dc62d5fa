use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivacyError {
    #[error("unsupported payload for redaction: {0}")]
    Unsupported(&'static str),
}

pub type PrivacyResult<T> = Result<T, PrivacyError>;
