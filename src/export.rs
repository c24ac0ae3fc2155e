//! Sheet export of batch results (`with-csv` feature).
//!
//! Each sheet is a two-column CSV document. A `Null` address is written as an
//! empty field.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::batch::BatchResult;
use crate::pipeline::VerificationOutcome;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sheet {
    /// Addresses that are not deliverable, with the reason.
    InvalidEmails,
    /// Every reported outcome, with its status detail.
    ValidationResults,
}

impl Sheet {
    pub const ALL: [Sheet; 2] = [Sheet::InvalidEmails, Sheet::ValidationResults];

    pub fn name(self) -> &'static str {
        match self {
            Self::InvalidEmails => "Invalid Emails",
            Self::ValidationResults => "Validation Results",
        }
    }

    pub fn headers(self) -> [&'static str; 2] {
        match self {
            Self::InvalidEmails => ["Email", "Reason"],
            Self::ValidationResults => ["Email", "Status"],
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::InvalidEmails => "invalid_emails.csv",
            Self::ValidationResults => "validation_results.csv",
        }
    }

    fn includes(self, outcome: &VerificationOutcome) -> bool {
        match self {
            Self::InvalidEmails => !outcome.status.is_deliverable(),
            Self::ValidationResults => true,
        }
    }
}

/// Writes one sheet of `result` as CSV, header row first.
pub fn write_sheet<W: Write>(
    sheet: Sheet,
    result: &BatchResult,
    writer: W,
) -> Result<(), ExportError> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    wtr.write_record(sheet.headers())?;
    for outcome in result.outcomes.iter().filter(|o| sheet.includes(o)) {
        wtr.write_record([outcome.address.to_string(), outcome.detail.clone()])?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes every sheet into `dir` and returns the created paths.
pub fn write_sheets(dir: &Path, result: &BatchResult) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::io(dir, source))?;
    let mut written = Vec::with_capacity(Sheet::ALL.len());
    for sheet in Sheet::ALL {
        let path = dir.join(sheet.file_name());
        let file = File::create(&path).map_err(|source| ExportError::io(&path, source))?;
        write_sheet(sheet, result, file)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellValue;
    use crate::pipeline::Status;

    fn sample() -> BatchResult {
        let outcomes = vec![
            VerificationOutcome::new("good@example.com".into(), Status::Verified),
            VerificationOutcome::new("bad-format".into(), Status::FormatInvalid).at(1),
            VerificationOutcome::new(CellValue::Null, Status::NullAddress).at(2),
            VerificationOutcome::new("ok@example.org".into(), Status::FallbackVerified).at(3),
            VerificationOutcome::new("x@example.net".into(), Status::Error)
                .with_detail("resolver exploded, twice")
                .at(4),
        ];
        BatchResult {
            processed: outcomes.len(),
            total: outcomes.len(),
            outcomes,
            cancelled: false,
        }
    }

    fn render(sheet: Sheet) -> String {
        let mut buf = Vec::new();
        write_sheet(sheet, &sample(), &mut buf).expect("sheet writes");
        String::from_utf8(buf).expect("utf-8")
    }

    #[test]
    fn invalid_emails_sheet() {
        insta::assert_snapshot!(render(Sheet::InvalidEmails), @r###"
        Email,Reason
        bad-format,Invalid format
        ,Email is None
        x@example.net,"resolver exploded, twice"
        "###);
    }

    #[test]
    fn validation_results_sheet() {
        insta::assert_snapshot!(render(Sheet::ValidationResults), @r###"
        Email,Status
        good@example.com,Valid
        bad-format,Invalid format
        ,Email is None
        ok@example.org,Verified by fallback service
        x@example.net,"resolver exploded, twice"
        "###);
    }

    #[test]
    fn empty_result_still_has_headers() {
        let mut buf = Vec::new();
        write_sheet(Sheet::InvalidEmails, &BatchResult::default(), &mut buf)
            .expect("sheet writes");
        assert_eq!(buf, b"Email,Reason\n");
    }

    #[test]
    fn sheet_metadata() {
        assert_eq!(Sheet::InvalidEmails.name(), "Invalid Emails");
        assert_eq!(Sheet::ValidationResults.name(), "Validation Results");
        assert_eq!(Sheet::ValidationResults.headers(), ["Email", "Status"]);
    }
}
