use std::sync::Arc;

use tracing::debug;
use trust_dns_resolver::Resolver;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};

use super::{MxError, MxRecord, MxStatus, ResolverOptions};
use crate::error::VerifyError;
use crate::pipeline::ExchangerCheck;

/// Longest domain handed to DNS.
const MAX_DOMAIN_LEN: usize = 255;

pub trait LookupMx: Send + Sync {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, MxError>;
}

impl<T: LookupMx + ?Sized> LookupMx for Arc<T> {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, MxError> {
        (**self).lookup_mx(domain)
    }
}

/// Lookups against the host's resolver configuration, bounded by
/// [`ResolverOptions`]. A fresh resolver is built per query so concurrent
/// workers never queue behind one another.
#[derive(Debug, Clone)]
pub struct SystemLookup {
    config: ResolverConfig,
    opts: ResolverOpts,
}

impl SystemLookup {
    pub fn from_system_conf(options: &ResolverOptions) -> Result<Self, MxError> {
        let (config, mut opts) =
            trust_dns_resolver::system_conf::read_system_conf().map_err(MxError::resolver_init)?;
        opts.timeout = options.timeout;
        opts.attempts = options.attempts.max(1);
        Ok(Self { config, opts })
    }
}

impl LookupMx for SystemLookup {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, MxError> {
        let resolver = Resolver::new(self.config.clone(), self.opts.clone())
            .map_err(MxError::resolver_init)?;
        let lookup = resolver.mx_lookup(domain).map_err(MxError::lookup)?;
        let mut records = Vec::new();
        for mx in lookup.iter() {
            let exchange = normalize_exchange(mx.exchange().to_utf8());
            records.push(MxRecord::new(mx.preference(), exchange));
        }
        Ok(records)
    }
}

/// MX stage of the pipeline.
#[derive(Debug, Clone)]
pub struct DomainResolver<L = Arc<SystemLookup>> {
    lookup: L,
}

impl DomainResolver {
    pub fn system(options: &ResolverOptions) -> Result<Self, MxError> {
        Ok(Self::with_lookup(Arc::new(SystemLookup::from_system_conf(
            options,
        )?)))
    }
}

impl<L: LookupMx> DomainResolver<L> {
    pub fn with_lookup(lookup: L) -> Self {
        Self { lookup }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Resolves MX records for `domain`, sorted by ascending preference.
    pub fn resolve(&self, domain: &str) -> Result<MxStatus, MxError> {
        let ascii = normalize_domain(domain)?;
        let mut records = self.lookup.lookup_mx(&ascii)?;

        records.sort();
        records.dedup();

        if records.is_empty() {
            Ok(MxStatus::NoRecords)
        } else {
            Ok(MxStatus::Records(records))
        }
    }

    /// `Ok(true)` when at least one exchanger exists. Expected DNS failures
    /// are `Ok(false)`; anything else surfaces as an error.
    pub fn has_mail_exchanger(&self, domain: &str) -> Result<bool, VerifyError> {
        match self.resolve(domain) {
            Ok(status) => Ok(!status.records().is_empty()),
            Err(err) if err.is_expected() => {
                debug!(domain, error = %err, "no mail exchanger");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl<L: LookupMx> ExchangerCheck for DomainResolver<L> {
    fn has_mail_exchanger(&self, domain: &str) -> Result<bool, VerifyError> {
        DomainResolver::<L>::has_mail_exchanger(self, domain)
    }
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, MxError> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(MxError::EmptyDomain);
    }
    if trimmed.len() > MAX_DOMAIN_LEN {
        return Err(MxError::DomainTooLong(trimmed.len()));
    }
    idna::domain_to_ascii(trimmed).map_err(MxError::idna)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}
