//! Run logs and summary output.
//!
//! Every outcome is appended to one of three per-run CSV logs under the
//! output root: created documents, already-existing documents, and failures.
//! All three files are created at run start and share one run timestamp; a
//! category without entries leaves a header-only file, so a run that emitted
//! no errors log can be told apart from one that never got to logging.

use crate::error::DocmillResult;
use crate::types::{DocumentOutcome, FieldAssignment, RowOutcome, RunTotals};
use chrono::Local;
use colored::Colorize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

struct CategoryLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CategoryLog {
    fn create(
        dir: &Path,
        name: &str,
        stamp: &str,
        header: &[&str],
    ) -> DocmillResult<Self> {
        let path = dir.join(format!("{}_{}.csv", name, stamp));
        let mut writer = csv::Writer::from_writer(File::create(&path)?);
        writer.write_record(header)?;
        Ok(Self { path, writer })
    }

    fn append(&mut self, record: &[String]) -> DocmillResult<()> {
        self.writer.write_record(record)?;
        Ok(())
    }

    fn finish(mut self, out: &mut Vec<PathBuf>) -> DocmillResult<()> {
        self.writer.flush()?;
        out.push(self.path);
        Ok(())
    }
}

/// The three category logs of a run.
pub struct RunLogger {
    created: CategoryLog,
    existing: CategoryLog,
    errors: CategoryLog,
}

impl RunLogger {
    /// Create the three log files under `dir`, stamped with the current time.
    pub fn new(dir: &Path) -> DocmillResult<Self> {
        fs::create_dir_all(dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        Ok(Self {
            created: CategoryLog::create(
                dir,
                "created",
                &stamp,
                &["Application", "Path", "Properties"],
            )?,
            existing: CategoryLog::create(
                dir,
                "existing",
                &stamp,
                &["Application", "Path", "StatusUpdated"],
            )?,
            errors: CategoryLog::create(dir, "errors", &stamp, &["Application", "Error"])?,
        })
    }

    /// Append one outcome to its category log.
    pub fn log(&mut self, outcome: &RowOutcome) -> DocmillResult<()> {
        match &outcome.outcome {
            DocumentOutcome::Created { path, fields } => self.created.append(&[
                outcome.identity.clone(),
                path.display().to_string(),
                format_fields(fields),
            ]),
            DocumentOutcome::AlreadyExists {
                path,
                status_updated,
            } => self.existing.append(&[
                outcome.identity.clone(),
                path.display().to_string(),
                status_updated.to_string(),
            ]),
            DocumentOutcome::Failed { reason } => self
                .errors
                .append(&[outcome.identity.clone(), reason.clone()]),
        }
    }

    /// Flush all three logs and return their paths.
    pub fn finish(self) -> DocmillResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        self.created.finish(&mut written)?;
        self.existing.finish(&mut written)?;
        self.errors.finish(&mut written)?;
        Ok(written)
    }
}

fn format_fields(fields: &[FieldAssignment]) -> String {
    fields
        .iter()
        .map(|f| format!("{}={}", f.name, f.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Print the end-of-run summary.
pub fn print_summary(totals: &RunTotals) {
    println!();
    println!("{}", "Run summary:".bold());
    println!("   {} {}", "Created:".green(), totals.created);
    println!("   {} {}", "Already existing:".yellow(), totals.existing);
    if totals.failed > 0 {
        println!("   {} {}", "Failed:".red().bold(), totals.failed);
    } else {
        println!("   {} {}", "Failed:".dimmed(), totals.failed);
    }
    println!("   {} {}", "Total rows:".bold(), totals.total());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn created(identity: &str) -> RowOutcome {
        RowOutcome {
            identity: identity.to_string(),
            outcome: DocumentOutcome::Created {
                path: PathBuf::from("out/x.docx"),
                fields: vec![FieldAssignment {
                    name: "System Name".into(),
                    value: "Orders".into(),
                }],
            },
        }
    }

    fn log_named(written: &[PathBuf], prefix: &str) -> PathBuf {
        written
            .iter()
            .find(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(prefix))
                    .unwrap_or(false)
            })
            .cloned()
            .unwrap()
    }

    #[test]
    fn every_run_writes_all_three_logs() {
        let tmp = TempDir::new().unwrap();
        let mut logger = RunLogger::new(tmp.path()).unwrap();
        logger.log(&created("Orders")).unwrap();

        let written = logger.finish().unwrap();
        assert_eq!(written.len(), 3);

        let content = std::fs::read_to_string(log_named(&written, "created_")).unwrap();
        assert!(content.starts_with("Application,Path,Properties"));
        assert!(content.contains("Orders"));
        assert!(content.contains("System Name=Orders"));

        // Categories without entries leave a header-only file.
        let errors = std::fs::read_to_string(log_named(&written, "errors_")).unwrap();
        assert_eq!(errors.trim_end(), "Application,Error");
    }

    #[test]
    fn error_log_records_reason() {
        let tmp = TempDir::new().unwrap();
        let mut logger = RunLogger::new(tmp.path()).unwrap();
        logger
            .log(&RowOutcome {
                identity: "Billing".into(),
                outcome: DocumentOutcome::Failed {
                    reason: "render failed, with a comma".into(),
                },
            })
            .unwrap();

        let written = logger.finish().unwrap();
        let content = std::fs::read_to_string(log_named(&written, "errors_")).unwrap();
        assert!(content.starts_with("Application,Error"));
        // csv quoting keeps the reason one field
        assert!(content.contains("\"render failed, with a comma\""));
    }
}
