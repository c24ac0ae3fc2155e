use std::io;

use thiserror::Error;

use super::types::ProbeStage;
use crate::mx::MxError;

/// Reasons a mailbox probe could not confirm acceptance.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("address '{0}' has no domain part")]
    InvalidAddress(String),
    #[error(transparent)]
    Mx(#[from] MxError),
    #[error("no mail exchanger for {domain}")]
    NoExchanger { domain: String },
    #[error("no socket address resolved for {host}")]
    NoAddress { host: String },
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error during {stage}: {source}")]
    Io {
        stage: ProbeStage,
        #[source]
        source: io::Error,
    },
    #[error("server closed the connection during {stage}")]
    Disconnected { stage: ProbeStage },
    #[error("timed out during {stage}")]
    Timeout { stage: ProbeStage },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{stage} answered {code}: {message}")]
    Rejected {
        stage: ProbeStage,
        code: u16,
        message: String,
    },
}

impl ProbeError {
    pub(crate) fn io(stage: ProbeStage, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout { stage },
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::Disconnected { stage },
            _ => Self::Io { stage, source },
        }
    }

    /// Every transport or protocol failure is an expected negative; only DNS
    /// errors outside the resolver's closed set are not.
    pub fn is_expected(&self) -> bool {
        match self {
            Self::Mx(err) => err.is_expected(),
            _ => true,
        }
    }
}
