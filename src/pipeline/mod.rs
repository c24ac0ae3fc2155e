//! Per-address verification: format, MX, SMTP probe, optional API fallback.
//!
//! Evaluation always stops at the first failing stage. Which outcomes end up
//! in a batch report is decided separately by
//! [`ReportScope`](crate::batch::ReportScope).

mod types;

pub use types::{Status, VerificationOutcome};

use tracing::debug;

use crate::cell::CellValue;
use crate::error::VerifyError;
use crate::mx::{MxError, ResolverOptions};
use crate::pacing::Pacer;
use crate::smtp_verify::{MailboxProbe, SmtpProbeOptions};
use crate::validator::{is_valid_email, split_address};

/// MX stage seam.
pub trait ExchangerCheck: Send + Sync {
    fn has_mail_exchanger(&self, domain: &str) -> Result<bool, VerifyError>;
}

/// SMTP probe stage seam.
pub trait MailboxCheck: Send + Sync {
    fn probe_mailbox(&self, address: &str) -> Result<bool, VerifyError>;
}

/// Fallback stage seam. Failures are a plain `false`, never an error.
pub trait FallbackVerifier: Send + Sync {
    fn verify_via_third_party(&self, address: &str) -> bool;
}

struct FallbackStage {
    verifier: Box<dyn FallbackVerifier>,
    pacer: Box<dyn Pacer>,
}

pub struct VerificationPipeline {
    exchanger: Box<dyn ExchangerCheck>,
    mailbox: Box<dyn MailboxCheck>,
    fallback: Option<FallbackStage>,
}

impl VerificationPipeline {
    pub fn new(
        exchanger: impl ExchangerCheck + 'static,
        mailbox: impl MailboxCheck + 'static,
    ) -> Self {
        Self {
            exchanger: Box::new(exchanger),
            mailbox: Box::new(mailbox),
            fallback: None,
        }
    }

    /// DNS and SMTP stages backed by the host resolver configuration; both
    /// stages share one lookup.
    pub fn system(
        resolver_options: &ResolverOptions,
        probe_options: SmtpProbeOptions,
    ) -> Result<Self, MxError> {
        let resolver = crate::mx::DomainResolver::system(resolver_options)?;
        let probe = MailboxProbe::new(resolver.clone(), probe_options);
        Ok(Self::new(resolver, probe))
    }

    /// Enables the fallback stage; calls are spaced by `pacer`.
    pub fn with_fallback(
        mut self,
        verifier: impl FallbackVerifier + 'static,
        pacer: impl Pacer + 'static,
    ) -> Self {
        self.fallback = Some(FallbackStage {
            verifier: Box::new(verifier),
            pacer: Box::new(pacer),
        });
        self
    }

    /// Fallback via the HTTP verification API, one call per second at most.
    #[cfg(feature = "with-fallback")]
    pub fn with_api_fallback(
        self,
        options: &crate::fallback::FallbackOptions,
    ) -> Result<Self, VerifyError> {
        let verifier = crate::fallback::ApiFallbackVerifier::new(options)?;
        Ok(self.with_fallback(
            verifier,
            crate::pacing::MinInterval::new(options.min_interval),
        ))
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Runs every stage for one cell, short-circuiting on the first failure.
    /// Errors are reserved for failures outside each stage's expected set.
    pub fn verify(&self, value: &CellValue) -> Result<VerificationOutcome, VerifyError> {
        let address = match value {
            CellValue::Null => return Ok(outcome(value, Status::NullAddress)),
            CellValue::Text(text) if is_valid_email(text) => text.trim(),
            _ => return Ok(outcome(value, Status::FormatInvalid)),
        };

        let Some((_, domain)) = split_address(address) else {
            return Ok(outcome(value, Status::FormatInvalid));
        };
        if !self.exchanger.has_mail_exchanger(&domain.to_lowercase())? {
            return Ok(outcome(value, Status::NoMailExchanger));
        }

        if self.mailbox.probe_mailbox(address)? {
            return Ok(outcome(value, Status::Verified));
        }

        let Some(fallback) = &self.fallback else {
            return Ok(outcome(value, Status::MailboxRejected));
        };
        fallback.pacer.pace();
        if fallback.verifier.verify_via_third_party(address) {
            Ok(outcome(value, Status::FallbackVerified))
        } else {
            debug!(address, "fallback did not confirm mailbox");
            Ok(outcome(value, Status::FallbackFailed))
        }
    }
}

fn outcome(value: &CellValue, status: Status) -> VerificationOutcome {
    VerificationOutcome::new(value.clone(), status)
}
