use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mailvet::batch::DEFAULT_WORKERS;
use mailvet::{
    BatchOptions, Concurrency, Pacing, ReportScope, ResolverOptions, SmtpProbeOptions,
};

#[derive(Parser)]
#[command(name = "mailvet-cli", version, about = "Batch e-mail verification")]
pub struct Cli {
    /// addresses to check
    pub emails: Vec<String>,

    /// read addresses from stdin (one per line)
    #[arg(long)]
    pub stdin: bool,

    /// CSV file holding the address column
    #[cfg(feature = "with-csv")]
    #[arg(long)]
    pub input: Option<std::path::PathBuf>,

    /// address column name in --input
    #[cfg(feature = "with-csv")]
    #[arg(long, default_value = "Email")]
    pub column: String,

    /// worker pool size
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// check one address at a time, in input order
    #[arg(long, conflicts_with = "workers")]
    pub sequential: bool,

    /// pacing: none|fixed:<ms>|interval:<ms>|bucket:<burst>/<ms>
    #[arg(long, default_value = "none")]
    pub pacing: String,

    /// reported records: invalid|all
    #[arg(long, default_value = "invalid")]
    pub scope: String,

    /// DNS timeout (ms)
    #[arg(long = "dns-timeout", default_value_t = 15_000)]
    pub dns_timeout_ms: u64,

    /// SMTP connect and per-command timeout (ms)
    #[arg(long = "smtp-timeout", default_value_t = 15_000)]
    pub smtp_timeout_ms: u64,

    /// overall SMTP session budget (ms)
    #[arg(long = "session-timeout", default_value_t = 20_000)]
    pub session_timeout_ms: u64,

    /// name sent with HELO (defaults to this host's name)
    #[arg(long)]
    pub helo: Option<String>,

    /// MAIL FROM envelope sender
    #[arg(long = "from", default_value = "test@example.com")]
    pub mail_from: String,

    /// SMTP port
    #[arg(long, default_value_t = 25)]
    pub port: u16,

    /// allow IPv6 exchanger addresses
    #[arg(long)]
    pub ipv6: bool,

    /// consult the verification API when the SMTP probe fails
    #[cfg(feature = "with-fallback")]
    #[arg(long)]
    pub fallback: bool,

    /// base URL of the verification API
    #[cfg(feature = "with-fallback")]
    #[arg(long = "fallback-url")]
    pub fallback_url: Option<String>,

    /// format: human|json|csv
    #[arg(long, default_value = "human")]
    pub format: String,

    /// write the result sheets into this directory
    #[cfg(feature = "with-csv")]
    #[arg(long = "out-dir")]
    pub out_dir: Option<std::path::PathBuf>,

    /// no progress on stderr
    #[arg(long, short)]
    pub quiet: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }

    pub fn batch_options(&self) -> Result<BatchOptions> {
        let concurrency = if self.sequential {
            Concurrency::Sequential
        } else {
            if self.workers == 0 {
                bail!("--workers must be at least 1");
            }
            Concurrency::Pooled {
                workers: self.workers,
            }
        };
        Ok(BatchOptions {
            concurrency,
            scope: scope_from_str(&self.scope)?,
            pacing: pacing_from_str(&self.pacing)?,
        })
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            timeout: Duration::from_millis(self.dns_timeout_ms),
            ..ResolverOptions::default()
        }
    }

    pub fn probe_options(&self) -> SmtpProbeOptions {
        let command_timeout = Duration::from_millis(self.smtp_timeout_ms);
        SmtpProbeOptions {
            port: self.port,
            helo_domain: self
                .helo
                .clone()
                .unwrap_or_else(mailvet::smtp_verify::local_host_identity),
            mail_from: self.mail_from.clone(),
            connect_timeout: command_timeout,
            command_timeout,
            session_timeout: Duration::from_millis(self.session_timeout_ms),
            ipv6: self.ipv6,
        }
    }

    #[cfg(feature = "with-fallback")]
    pub fn fallback_options(&self) -> mailvet::FallbackOptions {
        let mut options = mailvet::FallbackOptions::default();
        if let Some(url) = &self.fallback_url {
            options.base_url = url.clone();
        }
        options
    }
}

pub fn scope_from_str(s: &str) -> Result<ReportScope> {
    match s {
        "invalid" => Ok(ReportScope::InvalidOnly),
        "all" => Ok(ReportScope::All),
        other => bail!("unknown --scope '{other}', use: invalid|all"),
    }
}

pub fn pacing_from_str(s: &str) -> Result<Pacing> {
    let (kind, value) = s.split_once(':').unwrap_or((s, ""));
    let millis = |v: &str| -> Result<Duration> {
        let ms: u64 = v
            .parse()
            .with_context(|| format!("invalid milliseconds '{v}' in --pacing"))?;
        Ok(Duration::from_millis(ms))
    };
    match kind {
        "none" if value.is_empty() => Ok(Pacing::None),
        "fixed" => Ok(Pacing::FixedDelay(millis(value)?)),
        "interval" => Ok(Pacing::MinInterval(millis(value)?)),
        "bucket" => {
            let Some((burst, per)) = value.split_once('/') else {
                bail!("--pacing bucket expects <burst>/<ms>");
            };
            let burst: u32 = burst
                .parse()
                .with_context(|| format!("invalid burst '{burst}' in --pacing"))?;
            if burst == 0 {
                bail!("--pacing bucket burst must be at least 1");
            }
            Ok(Pacing::TokenBucket {
                burst,
                per: millis(per)?,
            })
        }
        _ => bail!("unknown --pacing '{s}', use: none|fixed:<ms>|interval:<ms>|bucket:<burst>/<ms>"),
    }
}
