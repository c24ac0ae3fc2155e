use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::error::ProbeError;
use super::options::SmtpProbeOptions;
use super::session::SmtpSession;
use crate::error::VerifyError;
use crate::mx::{DomainResolver, LookupMx, MxError, ResolverOptions, SystemLookup};
use crate::pipeline::MailboxCheck;
use crate::validator::split_address;

/// Mailbox-acceptance stage. A negative answer means "unproven", not
/// "nonexistent": plenty of servers refuse or fake probing traffic.
#[derive(Debug, Clone)]
pub struct MailboxProbe<L = Arc<SystemLookup>> {
    resolver: DomainResolver<L>,
    options: SmtpProbeOptions,
}

impl MailboxProbe {
    pub fn system(
        resolver_options: &ResolverOptions,
        options: SmtpProbeOptions,
    ) -> Result<Self, MxError> {
        Ok(Self::new(DomainResolver::system(resolver_options)?, options))
    }
}

impl<L: LookupMx> MailboxProbe<L> {
    pub fn new(resolver: DomainResolver<L>, options: SmtpProbeOptions) -> Self {
        Self { resolver, options }
    }

    pub fn options(&self) -> &SmtpProbeOptions {
        &self.options
    }

    /// `Ok(true)` when the first-priority exchanger answers `RCPT TO` with
    /// 250. Transport and protocol failures are `Ok(false)`.
    pub fn probe_mailbox(&self, address: &str) -> Result<bool, VerifyError> {
        match self.try_probe(address) {
            Ok(()) => Ok(true),
            Err(err) if err.is_expected() => {
                debug!(address, error = %err, "mailbox probe negative");
                Ok(false)
            }
            Err(ProbeError::Mx(err)) => Err(err.into()),
            Err(err) => Err(VerifyError::other(err.to_string())),
        }
    }

    /// Single attempt, no retry. The session is dropped (socket closed) on
    /// every path out of this function.
    pub fn try_probe(&self, address: &str) -> Result<(), ProbeError> {
        let address = address.trim();
        let (_, domain) =
            split_address(address).ok_or_else(|| ProbeError::InvalidAddress(address.into()))?;

        let status = self.resolver.resolve(domain)?;
        let primary = status.primary().ok_or_else(|| ProbeError::NoExchanger {
            domain: domain.to_string(),
        })?;

        let deadline = Instant::now() + self.options.session_timeout;
        let addrs = resolve_socket_addrs(&primary.exchange, self.options.port, self.options.ipv6)?;
        let mut session =
            SmtpSession::connect(&primary.exchange, &addrs, &self.options, deadline)?;
        let verdict = session.probe(&self.options, address);
        session.quit();
        verdict
    }
}

impl<L: LookupMx> MailboxCheck for MailboxProbe<L> {
    fn probe_mailbox(&self, address: &str) -> Result<bool, VerifyError> {
        MailboxProbe::<L>::probe_mailbox(self, address)
    }
}

fn resolve_socket_addrs(
    host: &str,
    port: u16,
    allow_ipv6: bool,
) -> Result<Vec<SocketAddr>, ProbeError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|err| ProbeError::Connect {
            host: host.to_string(),
            source: err,
        })?
        .filter(|addr| allow_ipv6 || addr.is_ipv4())
        .collect();
    if addrs.is_empty() {
        return Err(ProbeError::NoAddress {
            host: host.to_string(),
        });
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mx::tests::{StubResolver, resolve_failure};
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use trust_dns_resolver::error::ResolveErrorKind;

    fn probe_with(stub: StubResolver) -> MailboxProbe<StubResolver> {
        MailboxProbe::new(
            DomainResolver::with_lookup(stub),
            SmtpProbeOptions::default(),
        )
    }

    #[test]
    fn missing_exchanger_is_negative() {
        let probe = probe_with(StubResolver::new(|_| Ok(Vec::new())));
        assert!(matches!(
            probe.try_probe("user@example.com"),
            Err(ProbeError::NoExchanger { .. })
        ));
        assert!(!probe.probe_mailbox("user@example.com").expect("no error"));
    }

    #[test]
    fn dns_timeout_is_negative() {
        let probe = probe_with(StubResolver::new(|_| {
            Err(resolve_failure(ResolveErrorKind::Timeout))
        }));
        assert!(!probe.probe_mailbox("user@example.com").expect("no error"));
    }

    #[test]
    fn resolver_init_failure_is_unexpected() {
        let probe = probe_with(StubResolver::new(|_| Err(MxError::resolver_init("broken"))));
        assert!(probe.probe_mailbox("user@example.com").is_err());
    }

    #[test]
    fn malformed_address_is_negative() {
        let probe = probe_with(StubResolver::new(|domain| {
            panic!("unexpected lookup for '{domain}'")
        }));
        assert!(!probe.probe_mailbox("no-at-sign").expect("no error"));
    }

    fn spawn_mock_server(
        script: Vec<(&'static str, &'static str)>,
    ) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("addr").port();
        let (ready_tx, ready_rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            ready_tx.send(()).ok();
            let mut seen = Vec::new();
            if let Ok((mut stream, _)) = listener.accept() {
                let mut reader = BufReader::new(stream.try_clone().expect("clone"));
                stream.write_all(b"220 mock.smtp.test ESMTP\r\n").ok();
                for (expected, response) in script {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 {
                        break;
                    }
                    assert!(
                        line.starts_with(expected),
                        "expected command starting with '{expected}', got '{line}'"
                    );
                    seen.push(line.trim_end().to_string());
                    stream.write_all(response.as_bytes()).ok();
                }
            }
            seen
        });
        ready_rx.recv().expect("server ready");
        (port, handle)
    }

    #[test]
    #[ignore = "requires loopback TCP binding"]
    fn accepts_via_loopback_server() {
        let (port, handle) = spawn_mock_server(vec![
            ("HELO", "250 mock.example\r\n"),
            ("MAIL FROM:", "250 2.1.0 Ok\r\n"),
            ("RCPT TO:", "250 2.1.5 Ok\r\n"),
            ("QUIT", "221 2.0.0 Bye\r\n"),
        ]);
        let options = SmtpProbeOptions {
            port,
            ..SmtpProbeOptions::default()
        };
        let probe = MailboxProbe::new(
            DomainResolver::with_lookup(StubResolver::single("127.0.0.1")),
            options,
        );
        assert!(probe.probe_mailbox("user@example.com").expect("no error"));
        let seen = handle.join().expect("server thread");
        assert!(!seen.iter().any(|line| line.starts_with("DATA")));
    }
}
