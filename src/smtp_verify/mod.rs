//! Non-delivering SMTP mailbox probe.
//!
//! [`MailboxProbe::probe_mailbox`] connects to the domain's first-priority
//! exchanger and stops right after `RCPT TO`; no `DATA` is ever issued.

mod error;
mod options;
mod probe;
mod session;
mod types;

pub use error::ProbeError;
pub use options::{SmtpProbeOptions, local_host_identity};
pub use probe::MailboxProbe;
pub use types::{ProbeStage, SmtpReply};
