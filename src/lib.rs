#![forbid(unsafe_code)]
//! mailvet: batch e-mail hygiene checks (format, MX, SMTP probe, API fallback)

pub mod batch;
pub mod cell;
pub mod error;
#[cfg(feature = "with-csv")]
pub mod export;
#[cfg(feature = "with-fallback")]
pub mod fallback;
pub mod mx;
pub mod pacing;
pub mod pipeline;
pub mod smtp_verify;
pub mod validator;

pub use batch::{
    BatchOptions, BatchResult, BatchRunner, CancellationToken, Concurrency, Progress,
    ReportScope, run_batch,
};
pub use cell::{CellValue, Table};
pub use error::VerifyError;
#[cfg(feature = "with-csv")]
pub use export::{ExportError, Sheet, write_sheet, write_sheets};
#[cfg(feature = "with-fallback")]
pub use fallback::{ApiFallbackVerifier, FallbackError, FallbackOptions};
pub use mx::{DomainResolver, MxError, MxRecord, MxStatus, ResolverOptions};
pub use pacing::{Pacer, Pacing};
pub use pipeline::{
    ExchangerCheck, FallbackVerifier, MailboxCheck, Status, VerificationOutcome,
    VerificationPipeline,
};
pub use smtp_verify::{MailboxProbe, ProbeError, SmtpProbeOptions};
pub use validator::{is_valid_email, is_valid_format};
