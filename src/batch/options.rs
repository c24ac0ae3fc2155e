use crate::pacing::Pacing;
use crate::pipeline::{Status, VerificationOutcome};

/// Worker pool bound used when none is given.
pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// One address at a time, in input order.
    Sequential,
    /// Bounded pool; results arrive in completion order.
    Pooled { workers: usize },
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::Pooled {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Which outcomes a batch keeps.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportScope {
    /// Drop `Verified` records: absence means valid.
    #[default]
    InvalidOnly,
    /// One record per processed address.
    All,
}

impl ReportScope {
    pub fn keeps(self, status: Status) -> bool {
        match self {
            Self::All => true,
            Self::InvalidOnly => status != Status::Verified,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub concurrency: Concurrency,
    pub scope: ReportScope,
    /// Applied before each address is handed out.
    pub pacing: Pacing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub outcomes: Vec<VerificationOutcome>,
    pub processed: usize,
    pub total: usize,
    /// Set when a cancellation left addresses unprocessed.
    pub cancelled: bool,
}

impl BatchResult {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Outcomes that are neither `Verified` nor `FallbackVerified`.
    pub fn invalid(&self) -> impl Iterator<Item = &VerificationOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_deliverable())
    }

    pub fn errors(&self) -> impl Iterator<Item = &VerificationOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_error())
    }

    pub fn all_valid(&self) -> bool {
        self.invalid().next().is_none()
    }
}
