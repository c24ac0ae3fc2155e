use thiserror::Error;

use crate::mx::MxError;

/// Failures outside the expected negative outcomes of each stage. These are
/// reported per address as `Status::Error`, never as a verdict on the mailbox.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Mx(#[from] MxError),
    #[cfg(feature = "with-fallback")]
    #[error("fallback client initialization failed: {source}")]
    FallbackClient {
        #[source]
        source: reqwest::Error,
    },
    #[error("verification panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Other(String),
}

impl VerifyError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }
}
