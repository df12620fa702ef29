//! Mapping file loader.
//!
//! A mapping file associates spreadsheet columns with document property names,
//! one rule per line:
//!
//! ```text
//! Division, DOCUMENT_FOLDER
//! Application / System, System Name
//! Business Owner, Owner
//! ```
//!
//! Both sides are trimmed. Lines that do not split into exactly two non-empty
//! fields (blank lines, comments, prose) are skipped. A later line with the
//! same source column overwrites the earlier one. The reserved target
//! `DOCUMENT_FOLDER` selects the folder-partition column instead of
//! contributing a document field.

use crate::error::{DocmillError, DocmillResult};
use crate::types::ColumnMapping;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Default mapping file name, looked up next to the spreadsheet when no
/// explicit path is given.
pub const DEFAULT_MAPPING_FILE: &str = "column_mappings.txt";

/// Load a column mapping from a file. A missing or unreadable file is a fatal
/// startup error.
pub fn load_mapping(path: &Path) -> DocmillResult<ColumnMapping> {
    let content = fs::read_to_string(path).map_err(|e| {
        DocmillError::Mapping(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(parse_mapping(&content))
}

/// Parse mapping rules from text. Malformed lines are skipped, never fatal.
pub fn parse_mapping(content: &str) -> ColumnMapping {
    let mut mapping = ColumnMapping::new();

    for (line_no, line) in content.lines().enumerate() {
        let mut parts = line.splitn(2, ',');
        let source = parts.next().map(str::trim).unwrap_or("");
        let target = parts.next().map(str::trim).unwrap_or("");

        if source.is_empty() || target.is_empty() || target.contains(',') {
            if !line.trim().is_empty() {
                debug!(line = line_no + 1, "skipping malformed mapping line");
            }
            continue;
        }

        mapping.insert(source, target);
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DOCUMENT_FOLDER_FIELD;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_and_trims() {
        let mapping = parse_mapping("  Division ,  DOCUMENT_FOLDER \nOwner,Business Owner\n");
        assert_eq!(mapping.partition_source(), Some("Division"));
        assert_eq!(mapping.rules().len(), 1);
        assert_eq!(mapping.rules()[0].source, "Owner");
        assert_eq!(mapping.rules()[0].target, "Business Owner");
    }

    #[test]
    fn skips_malformed_lines() {
        let mapping = parse_mapping(
            "just a note without a comma\n\
             \n\
             A, B, C\n\
             OnlySource,\n\
             ,OnlyTarget\n\
             Real Column, Real Field\n",
        );
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.rules()[0].source, "Real Column");
    }

    #[test]
    fn source_column_may_contain_spaces_and_slashes() {
        let mapping = parse_mapping("Application / System, System Name\n");
        assert_eq!(mapping.rules()[0].source, "Application / System");
    }

    #[test]
    fn later_duplicate_source_overwrites() {
        let mapping = parse_mapping("Col, First\nCol, Second\n");
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.rules()[0].target, "Second");
    }

    #[test]
    fn partition_marker_is_case_sensitive() {
        let mapping = parse_mapping("Division, document_folder\n");
        assert_eq!(mapping.partition_source(), None);
        assert_eq!(mapping.rules()[0].target, "document_folder");
        let upper = parse_mapping(&format!("Division, {}\n", DOCUMENT_FOLDER_FIELD));
        assert_eq!(upper.partition_source(), Some("Division"));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = load_mapping(std::path::Path::new("/nonexistent/mappings.txt")).unwrap_err();
        assert!(matches!(err, DocmillError::Mapping(_)));
    }
}
