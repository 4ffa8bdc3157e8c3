//! Human and machine readable rendering of collected results.

use crate::sandbox::{ExitReason, FinishedInstance};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

const RECORD_DELIMITER: &str =
    "================================================================================";
const LOG_DELIMITER: &str =
    "--------------------------------------------------------------------------------";

/// Output format of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct ReportEntry<'a> {
    source: String,
    container: &'a str,
    started_at: DateTime<Utc>,
    reason: ExitReason,
    return_code: i64,
    log: String,
}

impl<'a> From<&'a FinishedInstance> for ReportEntry<'a> {
    fn from(finished: &'a FinishedInstance) -> Self {
        Self {
            source: finished.instance.source_path().display().to_string(),
            container: finished.instance.container_id().as_str(),
            started_at: finished.instance.started_at(),
            reason: finished.exit_reason,
            return_code: finished.return_code,
            log: finished.log_text().into_owned(),
        }
    }
}

/// Renders results in collection order. Output only; results are not touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Presenter {
    format: ReportFormat,
}

impl Presenter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Write every record to `out`.
    ///
    /// # Errors
    ///
    /// Returns error if writing fails.
    pub fn render<W: Write>(&self, results: &[FinishedInstance], out: &mut W) -> io::Result<()> {
        match self.format {
            ReportFormat::Text => {
                for finished in results {
                    render_text(finished, out)?;
                }
                Ok(())
            }
            ReportFormat::Json => {
                let entries: Vec<ReportEntry<'_>> = results.iter().map(ReportEntry::from).collect();
                serde_json::to_writer_pretty(&mut *out, &entries)?;
                writeln!(out)
            }
        }
    }
}

fn render_text<W: Write>(finished: &FinishedInstance, out: &mut W) -> io::Result<()> {
    let instance = &finished.instance;

    writeln!(out, "{}", RECORD_DELIMITER)?;
    writeln!(out, "source:    {}", instance.source_path().display())?;
    writeln!(out, "container: {}", instance.container_id())?;
    writeln!(
        out,
        "started:   {}",
        instance
            .started_at()
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;
    writeln!(out, "reason:    {}", finished.exit_reason)?;
    writeln!(out, "exit code: {}", finished.return_code)?;
    writeln!(out, "{}", LOG_DELIMITER)?;

    let log = finished.log_text();
    out.write_all(log.as_bytes())?;
    if !log.is_empty() && !log.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}
