use std::collections::HashMap;
use std::path::PathBuf;

//==============================================================================
// Well-known spreadsheet names
//==============================================================================

/// Header of the column whose value identifies a row.
pub const IDENTITY_COLUMN: &str = "Application / System";

/// Reserved mapping target marking the folder-partition source column.
pub const DOCUMENT_FOLDER_FIELD: &str = "DOCUMENT_FOLDER";

/// Literal stored in a status cell once a document exists.
pub const STATUS_YES: &str = "Yes";

//==============================================================================
// Document types
//==============================================================================

/// The kind of analysis document being generated.
///
/// Each type carries a display label used in output file names and the header
/// of its status column in the spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DocumentType {
    Type1,
    Type2,
    Type3,
}

impl DocumentType {
    /// Human-readable label, e.g. `"Type 1"`.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::Type1 => "Type 1",
            DocumentType::Type2 => "Type 2",
            DocumentType::Type3 => "Type 3",
        }
    }

    /// Header of the spreadsheet column tracking generation for this type.
    pub fn status_column(&self) -> String {
        format!("{} Analysis Created", self.label())
    }

    /// Output file name for a given row identity.
    pub fn document_name(&self, identity: &str) -> String {
        format!("{} - {} Analysis.docx", identity, self.label())
    }
}

//==============================================================================
// Spreadsheet model
//==============================================================================

/// A single cell value, as read from the worksheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

impl CellValue {
    /// Render the cell as the text that gets projected into a document
    /// property. Whole numbers drop their trailing `.0`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Empty => String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

/// One data row, keyed by header name.
///
/// `number` is the 1-based spreadsheet row number (data rows start at 2).
#[derive(Debug, Clone)]
pub struct Row {
    pub number: u32,
    cells: HashMap<String, CellValue>,
}

impl Row {
    pub fn new(number: u32, cells: HashMap<String, CellValue>) -> Self {
        Self { number, cells }
    }

    /// Look up a cell by column header.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    /// The row's identity value, trimmed; `None` when absent or blank.
    pub fn identity(&self) -> Option<String> {
        match self.cells.get(IDENTITY_COLUMN) {
            Some(v) if !v.is_empty() => Some(v.as_text().trim().to_string()),
            _ => None,
        }
    }
}

/// An ingested worksheet: header row plus data rows in sheet order.
///
/// Row numbers and `first_column` are absolute sheet coordinates; a used
/// range starting past A1 (empty leading columns or rows) does not shift
/// them.
#[derive(Debug, Clone)]
pub struct Worksheet {
    pub name: String,
    pub headers: Vec<String>,
    /// 0-based sheet column of the first header.
    pub first_column: u32,
    pub rows: Vec<Row>,
}

impl Worksheet {
    /// Absolute 0-based sheet column of a header by exact match.
    pub fn column_index(&self, header: &str) -> Option<u32> {
        self.headers
            .iter()
            .position(|h| h == header)
            .map(|i| self.first_column + i as u32)
    }

    /// Identity → row number, built once per run. Later rows with a duplicate
    /// identity overwrite earlier ones.
    pub fn row_index(&self) -> HashMap<String, u32> {
        let mut index = HashMap::new();
        for row in &self.rows {
            if let Some(identity) = row.identity() {
                index.insert(identity, row.number);
            }
        }
        index
    }
}

//==============================================================================
// Column mapping
//==============================================================================

/// One `source column → document field` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    pub source: String,
    pub target: String,
}

/// Ordered association between spreadsheet columns and document field names.
///
/// Source columns are unique (later rules overwrite earlier ones in place) and
/// the reserved `DOCUMENT_FOLDER` target is held apart from the projection
/// rules: it names the column whose value partitions output into subfolders.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    rules: Vec<MappingRule>,
    partition_source: Option<String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, overwriting any earlier rule with the same source
    /// column. A `DOCUMENT_FOLDER` target moves the source out of the
    /// projection set; a later ordinary target moves it back in.
    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        let source = source.into();
        let target = target.into();

        if self.partition_source.as_deref() == Some(source.as_str()) {
            self.partition_source = None;
        }

        if target == DOCUMENT_FOLDER_FIELD {
            self.rules.retain(|r| r.source != source);
            self.partition_source = Some(source);
            return;
        }

        if let Some(existing) = self.rules.iter_mut().find(|r| r.source == source) {
            existing.target = target;
        } else {
            self.rules.push(MappingRule { source, target });
        }
    }

    /// Projection rules, in insertion order, excluding the partition entry.
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Source column of the `DOCUMENT_FOLDER` entry, if the mapping has one.
    pub fn partition_source(&self) -> Option<&str> {
        self.partition_source.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.partition_source.is_none()
    }

    pub fn len(&self) -> usize {
        self.rules.len() + usize::from(self.partition_source.is_some())
    }
}

//==============================================================================
// Outcomes
//==============================================================================

/// A document field actually written to an output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAssignment {
    pub name: String,
    pub value: String,
}

/// What happened to one row.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    /// A new document was rendered at `path` with `fields` applied.
    Created {
        path: PathBuf,
        fields: Vec<FieldAssignment>,
    },
    /// The output file was already present; `status_updated` records whether
    /// the status cell had to be corrected to "Yes".
    AlreadyExists { path: PathBuf, status_updated: bool },
    /// Rendering failed; the run continues with the next row.
    Failed { reason: String },
}

/// A per-row outcome tagged with the row's identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    pub identity: String,
    pub outcome: DocumentOutcome,
}

/// Per-category counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
}

impl RunTotals {
    pub fn record(&mut self, outcome: &DocumentOutcome) {
        match outcome {
            DocumentOutcome::Created { .. } => self.created += 1,
            DocumentOutcome::AlreadyExists { .. } => self.existing += 1,
            DocumentOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.existing + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_names() {
        assert_eq!(DocumentType::Type1.label(), "Type 1");
        assert_eq!(
            DocumentType::Type2.status_column(),
            "Type 2 Analysis Created"
        );
        assert_eq!(
            DocumentType::Type3.document_name("Orders"),
            "Orders - Type 3 Analysis.docx"
        );
    }

    #[test]
    fn cell_value_text() {
        assert_eq!(CellValue::Number(42.0).as_text(), "42");
        assert_eq!(CellValue::Number(2.5).as_text(), "2.5");
        assert_eq!(CellValue::Text("  ".into()).is_empty(), true);
        assert_eq!(CellValue::Empty.is_empty(), true);
    }

    #[test]
    fn mapping_overwrite_keeps_position() {
        let mut mapping = ColumnMapping::new();
        mapping.insert("A", "First");
        mapping.insert("B", "Second");
        mapping.insert("A", "Replaced");

        let targets: Vec<_> = mapping.rules().iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["Replaced", "Second"]);
    }

    #[test]
    fn mapping_partition_entry_is_isolated() {
        let mut mapping = ColumnMapping::new();
        mapping.insert("Division", DOCUMENT_FOLDER_FIELD);
        mapping.insert("Application / System", "System Name");

        assert_eq!(mapping.partition_source(), Some("Division"));
        assert_eq!(mapping.rules().len(), 1);
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn mapping_partition_last_wins() {
        let mut mapping = ColumnMapping::new();
        mapping.insert("Division", DOCUMENT_FOLDER_FIELD);
        mapping.insert("Region", DOCUMENT_FOLDER_FIELD);
        assert_eq!(mapping.partition_source(), Some("Region"));

        // Remapping the partition column to an ordinary field clears it.
        mapping.insert("Region", "Region Name");
        assert_eq!(mapping.partition_source(), None);
        assert_eq!(mapping.rules().len(), 1);
    }
}
