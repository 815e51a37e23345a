//! # Run Report
//!
//! Summary counts for the end of a run, and an optional CSV audit report with
//! one row per input record.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::controller::types::RecordReport;

/// Counts per outcome label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub failures: usize,
    pub by_outcome: BTreeMap<&'static str, usize>,
}

impl Summary {
    #[must_use]
    pub fn from_reports(reports: &[RecordReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.total += 1;
            if report.outcome.is_failure() {
                summary.failures += 1;
            }
            *summary.by_outcome.entry(report.outcome.label()).or_default() += 1;
        }
        summary
    }

    pub fn count(&self, label: &str) -> usize {
        self.by_outcome.get(label).copied().unwrap_or_default()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processed {} record(s), {} failed", self.total, self.failures)?;
        for (label, count) in &self.by_outcome {
            writeln!(f, "  {label}: {count}")?;
        }
        Ok(())
    }
}

/// Write one CSV row per record: line, resource path, tenant, outcome, detail
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_report<W: Write>(writer: W, reports: &[RecordReport]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["line", "resource_path", "tenant_id", "outcome", "detail"])?;

    for report in reports {
        writer.write_record([
            report.record.line.to_string(),
            report.record.resource_path.clone(),
            report.record.tenant_id.clone(),
            report.outcome.label().to_string(),
            report.outcome.to_string(),
        ])?;
    }

    writer.flush().context("Failed to flush report")?;
    Ok(())
}

/// Write the CSV audit report to `path`
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_report_file(path: &Path, reports: &[RecordReport]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;
    write_report(std::io::BufWriter::new(file), reports)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
