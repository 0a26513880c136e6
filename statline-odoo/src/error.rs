use thiserror::Error;

#[derive(Debug, Error)]
pub enum OdooError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("XML-RPC fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("authentication rejected for user {0}")]
    AuthRejected(String),

    #[error("malformed XML-RPC payload: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, OdooError>;
