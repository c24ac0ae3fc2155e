use std::time::Duration;

/// Configuration knobs for [`MailboxProbe`](super::MailboxProbe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpProbeOptions {
    pub port: u16,
    pub helo_domain: String,
    pub mail_from: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    /// Upper bound for the whole dialogue, connect included.
    pub session_timeout: Duration,
    pub ipv6: bool,
}

impl Default for SmtpProbeOptions {
    fn default() -> Self {
        Self {
            port: 25,
            helo_domain: local_host_identity(),
            mail_from: "test@example.com".to_string(),
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(15),
            session_timeout: Duration::from_secs(20),
            ipv6: false,
        }
    }
}

/// The machine's host name, as announced in `HELO`; `localhost` when it
/// cannot be read.
pub fn local_host_identity() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && !name.contains(char::is_whitespace))
        .unwrap_or_else(|| "localhost".to_string())
}

impl SmtpProbeOptions {
    pub fn helo_command(&self) -> String {
        let name = self.helo_domain.trim();
        if name.is_empty() {
            "HELO localhost".to_string()
        } else {
            format!("HELO {name}")
        }
    }

    pub fn mail_from_command(&self) -> String {
        format!("MAIL FROM:<{}>", self.mail_from.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_helo_names_this_host() {
        let options = SmtpProbeOptions::default();
        assert_eq!(options.helo_domain, local_host_identity());
        match hostname::get().ok().and_then(|n| n.into_string().ok()) {
            Some(name) if !name.trim().is_empty() && !name.trim().contains(char::is_whitespace) => {
                assert_eq!(options.helo_domain, name.trim());
            }
            _ => assert_eq!(options.helo_domain, "localhost"),
        }
        assert_eq!(
            options.helo_command(),
            format!("HELO {}", options.helo_domain)
        );
    }

    #[test]
    fn blank_helo_falls_back_to_localhost() {
        let options = SmtpProbeOptions {
            helo_domain: "  ".to_string(),
            ..SmtpProbeOptions::default()
        };
        assert_eq!(options.helo_command(), "HELO localhost");
    }
}
