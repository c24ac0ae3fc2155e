use anyhow::{Result, bail};

use mailvet::{BatchResult, Progress, Status};

pub fn check_format(format: &str) -> Result<()> {
    match format {
        "human" => Ok(()),
        #[cfg(feature = "with-serde")]
        "json" => Ok(()),
        #[cfg(not(feature = "with-serde"))]
        "json" => bail!("format=json requires the 'with-serde' feature"),
        #[cfg(feature = "with-csv")]
        "csv" => Ok(()),
        #[cfg(not(feature = "with-csv"))]
        "csv" => bail!("format=csv requires the 'with-csv' feature"),
        other => bail!("unknown --format '{other}', use: human|json|csv"),
    }
}

pub fn write_report(result: &BatchResult, format: &str) -> Result<()> {
    match format {
        "json" => write_json(result),
        "csv" => write_csv(result),
        _ => {
            write_human(result);
            Ok(())
        }
    }
}

pub fn report_progress(progress: Progress) {
    eprint!(
        "\r{}/{} ({:.0}%)",
        progress.completed,
        progress.total,
        progress.fraction() * 100.0
    );
    if progress.completed == progress.total {
        eprintln!();
    }
}

/// Exit status 2 applies to any non-deliverable or errored record.
pub fn any_invalid(result: &BatchResult) -> bool {
    !result.all_valid() || result.cancelled
}

fn write_human(result: &BatchResult) {
    for outcome in &result.outcomes {
        let tag = match outcome.status {
            Status::Verified | Status::FallbackVerified => "[OK]     ",
            Status::Error => "[ERROR]  ",
            _ => "[INVALID]",
        };
        println!("{tag} {} :: {}", outcome.address, outcome.detail);
    }
    let invalid = result.invalid().count();
    println!(
        "{} checked, {} invalid, {} errors{}",
        result.processed,
        invalid,
        result.errors().count(),
        if result.cancelled { " (cancelled)" } else { "" }
    );
}

#[cfg(feature = "with-serde")]
fn write_json(result: &BatchResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

#[cfg(not(feature = "with-serde"))]
fn write_json(_: &BatchResult) -> Result<()> {
    bail!("format=json requires the 'with-serde' feature")
}

#[cfg(feature = "with-csv")]
fn write_csv(result: &BatchResult) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    wtr.write_record(["Index", "Email", "Status", "Detail"])?;
    for outcome in &result.outcomes {
        wtr.write_record([
            outcome.index.to_string(),
            outcome.address.to_string(),
            outcome.status.to_string(),
            outcome.detail.clone(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(not(feature = "with-csv"))]
fn write_csv(_: &BatchResult) -> Result<()> {
    bail!("format=csv requires the 'with-csv' feature")
}

#[cfg(feature = "with-csv")]
pub fn write_sheets(dir: &std::path::Path, result: &BatchResult) -> Result<()> {
    use anyhow::Context;

    let written = mailvet::write_sheets(dir, result)
        .with_context(|| format!("export sheets to {}", dir.display()))?;
    for path in written {
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}
