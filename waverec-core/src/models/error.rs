use thiserror::Error;

/// Errors that can occur while negotiating, streaming, or persisting a
/// capture session.
///
/// Negotiation and file-open failures abort startup; `Protocol` failures
/// mid-stream still drive the loop through its draining path so the partial
/// file stays loadable. No variant is ever retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no default audio endpoint is available")]
    DeviceUnavailable,

    #[error("shared-mode format negotiation failed: {0}")]
    FormatNegotiationFailed(String),

    #[error("audio service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("i/o failure: {0}")]
    Io(String),

    #[error("writer used before a format was set")]
    NotInitialized,

    #[error("unexpected device state: {0}")]
    Protocol(String),
}

impl CaptureError {
    /// Wrap a file-system error. The writer path reports everything through
    /// this so the enum stays `Clone`.
    pub fn io(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
