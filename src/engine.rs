//! Row-to-document reconciliation.
//!
//! For every worksheet row the engine decides whether a document must be
//! created, skipped, or only have its status corrected, and drives the
//! renderer and status tracker accordingly. Rendering failures are absorbed
//! into a `Failed` outcome and never unwind past the row boundary.

use crate::error::DocmillResult;
use crate::excel::StatusUpdate;
use crate::types::{
    ColumnMapping, DocumentOutcome, DocumentType, FieldAssignment, RowOutcome, RunTotals,
    Worksheet, STATUS_YES,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Renders one output document from the shared template.
pub trait DocumentRenderer {
    fn render(&mut self, output: &Path, fields: &[FieldAssignment]) -> DocmillResult<()>;
}

impl DocumentRenderer for crate::docx::DocxTemplate {
    fn render(&mut self, output: &Path, fields: &[FieldAssignment]) -> DocmillResult<()> {
        crate::docx::DocxTemplate::render(self, output, fields)
    }
}

/// Tracks the per-row status cell for the run's document type.
pub trait StatusTracker {
    /// Whether the row's status cell exists and does not already read "Yes".
    fn needs_update(&self, row: u32) -> bool;
    /// Record "Yes" for the row. A no-op when the sheet has no status column.
    fn set_yes(&mut self, row: u32);
}

/// The worksheet's status column for one document type, plus the writes
/// accumulated against it. Absence of the column degrades every update to a
/// no-op rather than an error.
pub struct StatusColumn {
    col: Option<u32>,
    values: HashMap<u32, String>,
    pending: Vec<StatusUpdate>,
}

impl StatusColumn {
    /// Find the status column for `doc_type` by exact header match and
    /// snapshot its current values. Emits a one-time warning when absent.
    pub fn locate(worksheet: &Worksheet, doc_type: DocumentType) -> Self {
        let header = doc_type.status_column();
        let col = worksheet.column_index(&header);

        let mut values = HashMap::new();
        if col.is_some() {
            for row in &worksheet.rows {
                if let Some(v) = row.get(&header) {
                    if !v.is_empty() {
                        values.insert(row.number, v.as_text());
                    }
                }
            }
        } else {
            warn!(
                column = %header,
                "worksheet has no status column; status tracking disabled for this run"
            );
        }

        Self {
            col,
            values,
            pending: Vec::new(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.col.is_some()
    }

    /// The cell writes to apply to the workbook at end of run.
    pub fn pending(&self) -> &[StatusUpdate] {
        &self.pending
    }
}

impl StatusTracker for StatusColumn {
    fn needs_update(&self, row: u32) -> bool {
        self.col.is_some() && self.values.get(&row).map(String::as_str) != Some(STATUS_YES)
    }

    fn set_yes(&mut self, row: u32) {
        if let Some(col) = self.col {
            // Idempotent within a run: one write per cell.
            if self.values.get(&row).map(String::as_str) != Some(STATUS_YES) {
                self.values.insert(row, STATUS_YES.to_string());
                self.pending.push(StatusUpdate { row, col });
            }
        }
    }
}

/// The result of reconciling every row once.
#[derive(Debug)]
pub struct EngineRun {
    pub outcomes: Vec<RowOutcome>,
    pub totals: RunTotals,
}

/// Reconciliation driver. Holds the run-wide configuration; per-run state
/// lives in the collaborators passed to [`Engine::run`].
pub struct Engine<'a> {
    mapping: &'a ColumnMapping,
    doc_type: DocumentType,
    output_root: &'a Path,
    dry_run: bool,
}

impl<'a> Engine<'a> {
    pub fn new(mapping: &'a ColumnMapping, doc_type: DocumentType, output_root: &'a Path) -> Self {
        Self {
            mapping,
            doc_type,
            output_root,
            dry_run: false,
        }
    }

    /// In dry-run mode decisions are computed and reported but nothing is
    /// rendered, no folders are created, and no status is recorded.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Process every row in sheet order.
    pub fn run(
        &self,
        worksheet: &Worksheet,
        renderer: &mut dyn DocumentRenderer,
        status: &mut dyn StatusTracker,
    ) -> EngineRun {
        let row_index = worksheet.row_index();
        let mut outcomes = Vec::new();
        let mut totals = RunTotals::default();

        for row in &worksheet.rows {
            // Rows without an identity are discarded outright: no outcome,
            // no log entry.
            let Some(identity) = row.identity() else {
                debug!(row = row.number, "skipping row with empty identity");
                continue;
            };

            // Status writes resolve through the identity index, so duplicate
            // identities all land on the last row seen.
            let status_row = row_index.get(&identity).copied().unwrap_or(row.number);

            let outcome = self.reconcile_row(row, &identity, status_row, renderer, status);
            totals.record(&outcome);
            outcomes.push(RowOutcome { identity, outcome });
        }

        EngineRun { outcomes, totals }
    }

    fn reconcile_row(
        &self,
        row: &crate::types::Row,
        identity: &str,
        status_row: u32,
        renderer: &mut dyn DocumentRenderer,
        status: &mut dyn StatusTracker,
    ) -> DocumentOutcome {
        let folder = self.resolve_folder(row);
        let path = folder.join(self.doc_type.document_name(identity));

        if path.exists() {
            // Never reopened or revalidated; only the status cell may need
            // correcting.
            let status_updated = if !self.dry_run && status.needs_update(status_row) {
                status.set_yes(status_row);
                true
            } else if self.dry_run {
                status.needs_update(status_row)
            } else {
                false
            };
            debug!(identity, path = %path.display(), status_updated, "document already exists");
            return DocumentOutcome::AlreadyExists {
                path,
                status_updated,
            };
        }

        let fields = self.project_fields(row);

        if self.dry_run {
            return DocumentOutcome::Created { path, fields };
        }

        if let Err(e) = fs::create_dir_all(&folder) {
            return DocumentOutcome::Failed {
                reason: format!("cannot create folder {}: {}", folder.display(), e),
            };
        }

        match renderer.render(&path, &fields) {
            Ok(()) => {
                status.set_yes(status_row);
                debug!(identity, path = %path.display(), fields = fields.len(), "document created");
                DocumentOutcome::Created { path, fields }
            }
            Err(e) => {
                // Leave no partial output behind for this row.
                let _ = fs::remove_file(&path);
                DocumentOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Output folder for a row: the partition column's value under the output
    /// root, or the root itself when unmapped or empty.
    fn resolve_folder(&self, row: &crate::types::Row) -> PathBuf {
        let partition = self
            .mapping
            .partition_source()
            .and_then(|col| row.get(col))
            .filter(|v| !v.is_empty())
            .map(|v| v.as_text().trim().to_string());

        match partition {
            Some(p) => self.output_root.join(p),
            None => self.output_root.to_path_buf(),
        }
    }

    /// Field assignments for a row: every mapping rule whose source cell is
    /// non-empty, in mapping order. The partition entry never projects.
    fn project_fields(&self, row: &crate::types::Row) -> Vec<FieldAssignment> {
        self.mapping
            .rules()
            .iter()
            .filter_map(|rule| {
                let value = row.get(&rule.source)?;
                if value.is_empty() {
                    return None;
                }
                Some(FieldAssignment {
                    name: rule.target.clone(),
                    value: value.as_text(),
                })
            })
            .collect()
    }
}
