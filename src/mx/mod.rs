//! DNS mail-exchanger resolution.
//!
//! [`DomainResolver::has_mail_exchanger`] answers the pipeline's second stage;
//! [`DomainResolver::resolve`] exposes the sorted records for the SMTP probe.

mod error;
mod resolver;
mod types;

pub use error::MxError;
pub use resolver::{DomainResolver, LookupMx, SystemLookup};
pub use types::{MxRecord, MxStatus, ResolverOptions};
