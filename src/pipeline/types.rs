use std::fmt;

use crate::cell::CellValue;

/// Terminal classification of one address.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NullAddress,
    FormatInvalid,
    NoMailExchanger,
    MailboxRejected,
    Verified,
    FallbackVerified,
    FallbackFailed,
    Error,
}

impl Status {
    /// Detail used when a stage has nothing more specific to say.
    pub fn default_detail(self) -> &'static str {
        match self {
            Self::NullAddress => "Email is None",
            Self::FormatInvalid => "Invalid format",
            Self::NoMailExchanger => "Invalid MX record",
            Self::MailboxRejected => "SMTP check failed",
            Self::Verified => "Valid",
            Self::FallbackVerified => "Verified by fallback service",
            Self::FallbackFailed => "Fallback verification failed",
            Self::Error => "Unexpected error",
        }
    }

    pub fn is_deliverable(self) -> bool {
        matches!(self, Self::Verified | Self::FallbackVerified)
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NullAddress => "NullAddress",
            Self::FormatInvalid => "FormatInvalid",
            Self::NoMailExchanger => "NoMailExchanger",
            Self::MailboxRejected => "MailboxRejected",
            Self::Verified => "Verified",
            Self::FallbackVerified => "FallbackVerified",
            Self::FallbackFailed => "FallbackFailed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    /// Position of the address in the input column.
    pub index: usize,
    pub address: CellValue,
    pub status: Status,
    pub detail: String,
}

impl VerificationOutcome {
    pub fn new(address: CellValue, status: Status) -> Self {
        Self {
            index: 0,
            address,
            status,
            detail: status.default_detail().to_string(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}
