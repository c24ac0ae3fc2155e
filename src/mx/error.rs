use thiserror::Error;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

#[derive(Debug, Error)]
pub enum MxError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("domain length {0} > 255")]
    DomainTooLong(usize),
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("MX lookup failed: {source}")]
    Lookup {
        #[source]
        source: ResolveError,
    },
}

impl MxError {
    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::IdnaConversion { source }
    }

    pub(crate) fn resolver_init(
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ResolverInit {
            source: source.into(),
        }
    }

    pub fn lookup(source: ResolveError) -> Self {
        Self::Lookup { source }
    }

    /// True for the closed set of failures that simply mean "no usable
    /// exchanger": bad input, NXDOMAIN/no answer, timeouts, network and
    /// protocol errors. Anything else points at a bug or a broken host setup.
    pub fn is_expected(&self) -> bool {
        match self {
            Self::EmptyDomain | Self::DomainTooLong(_) | Self::IdnaConversion { .. } => true,
            Self::ResolverInit { .. } => false,
            Self::Lookup { source } => matches!(
                source.kind(),
                ResolveErrorKind::NoRecordsFound { .. }
                    | ResolveErrorKind::Timeout
                    | ResolveErrorKind::Io(_)
                    | ResolveErrorKind::Proto(_)
                    | ResolveErrorKind::NoConnections
            ),
        }
    }
}
