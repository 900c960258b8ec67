use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("desired state unavailable: {0}")]
    Desired(String),
}
