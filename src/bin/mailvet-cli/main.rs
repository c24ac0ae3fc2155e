mod args;
mod output;

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use mailvet::{CellValue, VerificationPipeline, run_batch};
use tracing_subscriber::EnvFilter;

use args::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let addresses = collect_addresses(&cli)?;
    if addresses.is_empty() {
        Cli::clap_command().print_help()?;
        println!();
        return Ok(());
    }

    output::check_format(&cli.format)?;
    let options = cli.batch_options()?;
    let pipeline = build_pipeline(&cli)?;

    let quiet = cli.quiet;
    let result = run_batch(&pipeline, &addresses, options, |progress| {
        if !quiet {
            output::report_progress(progress);
        }
    });

    output::write_report(&result, &cli.format)?;

    #[cfg(feature = "with-csv")]
    if let Some(dir) = &cli.out_dir {
        output::write_sheets(dir, &result)?;
    }

    // exit codes: 0 all valid, 2 invalid or errored, 1 fatal
    if output::any_invalid(&result) {
        std::process::exit(2);
    }
    Ok(())
}

fn build_pipeline(cli: &Cli) -> Result<VerificationPipeline> {
    let pipeline = VerificationPipeline::system(&cli.resolver_options(), cli.probe_options())
        .context("initialize DNS resolver")?;

    #[cfg(feature = "with-fallback")]
    let pipeline = if cli.fallback {
        pipeline
            .with_api_fallback(&cli.fallback_options())
            .context("initialize fallback client")?
    } else {
        pipeline
    };

    Ok(pipeline)
}

fn collect_addresses(cli: &Cli) -> Result<Vec<CellValue>> {
    let mut addresses: Vec<CellValue> = cli.emails.iter().map(|e| e.as_str().into()).collect();

    if cli.stdin {
        for line in io::stdin().lock().lines() {
            let line = line.context("read stdin")?;
            addresses.push(CellValue::parse_field(line.trim_end_matches('\r')));
        }
    }

    #[cfg(feature = "with-csv")]
    if let Some(path) = &cli.input {
        let file = std::fs::File::open(path)
            .with_context(|| format!("open {}", path.display()))?;
        let table = mailvet::Table::from_csv_reader(file)
            .with_context(|| format!("parse {}", path.display()))?;
        let Some(column) = table.column(&cli.column) else {
            anyhow::bail!(
                "column '{}' not found in {} (headers: {})",
                cli.column,
                path.display(),
                table.headers().join(", ")
            );
        };
        addresses.extend_from_slice(column);
    }

    Ok(addresses)
}
