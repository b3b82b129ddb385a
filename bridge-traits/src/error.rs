use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The remote service answered with a non-success status.
    #[error("Remote service returned {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Status code reported by the remote service, if the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::RemoteStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
