//! In-place status write-back for the source workbook.
//!
//! Status updates are buffered during the run and applied once at the end:
//! the workbook archive is streamed entry-by-entry into a temp file with the
//! target worksheet's XML rewritten, then renamed over the original. A killed
//! run leaves either the old workbook or the fully patched one, never a torn
//! archive.
//!
//! Patched cells are written as inline strings. An existing cell element is
//! replaced wholesale (its style attribute is kept); a missing cell is
//! inserted at its column position within the row.

use crate::error::{DocmillError, DocmillResult};
use crate::types::STATUS_YES;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// A single pending status-cell write: 1-based row number, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub row: u32,
    pub col: u32,
}

/// Apply buffered status updates to the workbook at `path`, in place.
///
/// A no-op when `updates` is empty.
pub fn apply_status_updates(
    path: &Path,
    sheet_name: &str,
    updates: &[StatusUpdate],
) -> DocmillResult<()> {
    if updates.is_empty() {
        return Ok(());
    }

    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let sheet_part = resolve_sheet_part(&mut archive, sheet_name)?;
    debug!(part = %sheet_part, updates = updates.len(), "patching status cells");

    let patched = {
        let mut entry = archive.by_name(&sheet_part)?;
        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;
        patch_sheet_xml(&xml, updates)?
    };

    // Rewrite every entry into a temp sibling, swapping in the patched sheet.
    let tmp_path = temp_sibling(path);
    let result = write_patched_archive(&mut archive, &tmp_path, &sheet_part, &patched)
        .and_then(|_| fs::rename(&tmp_path, path).map_err(DocmillError::from));

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".docmill-tmp");
    path.with_file_name(name)
}

fn write_patched_archive(
    archive: &mut ZipArchive<File>,
    tmp_path: &Path,
    sheet_part: &str,
    patched: &str,
) -> DocmillResult<()> {
    let out = File::create(tmp_path)?;
    let mut writer = ZipWriter::new(out);
    let options = SimpleFileOptions::default();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            let name = entry.name().to_string();
            writer.add_directory(name, options)?;
            continue;
        }
        if entry.name() == sheet_part {
            writer.start_file(sheet_part, options)?;
            writer.write_all(patched.as_bytes())?;
        } else {
            let name = entry.name().to_string();
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut buf)?;
            writer.start_file(name, options)?;
            writer.write_all(&buf)?;
        }
    }

    writer.finish()?;
    Ok(())
}

/// Resolve a worksheet name to its part path inside the archive by chasing
/// `xl/workbook.xml` sheet entries through `xl/_rels/workbook.xml.rels`.
fn resolve_sheet_part(archive: &mut ZipArchive<File>, sheet_name: &str) -> DocmillResult<String> {
    let workbook_xml = read_entry(archive, "xl/workbook.xml")?;
    let rels_xml = read_entry(archive, "xl/_rels/workbook.xml.rels")?;

    let mut rel_id: Option<String> = None;
    let mut reader = Reader::from_str(&workbook_xml);
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut id = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                        b"r:id" | b"id" => {
                            id = Some(String::from_utf8_lossy(&attr.value).into_owned())
                        }
                        _ => {}
                    }
                }
                if name.as_deref() == Some(sheet_name) {
                    rel_id = id;
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let rel_id = rel_id.ok_or_else(|| {
        DocmillError::Spreadsheet(format!("worksheet '{}' not found in workbook", sheet_name))
    })?;

    let mut targets: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(&rels_xml);
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).into_owned()),
                        b"Target" => {
                            target = Some(String::from_utf8_lossy(&attr.value).into_owned())
                        }
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let target = targets.get(&rel_id).ok_or_else(|| {
        DocmillError::Spreadsheet(format!("no relationship target for sheet '{}'", sheet_name))
    })?;

    Ok(if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("xl/{}", target)
    })
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> DocmillResult<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| DocmillError::Spreadsheet(format!("workbook is missing {}", name)))?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

/// Rewrite worksheet XML with the given cells set to the inline string "Yes".
fn patch_sheet_xml(xml: &str, updates: &[StatusUpdate]) -> DocmillResult<String> {
    // row number -> ordered set of 0-based target columns
    let mut targets: HashMap<u32, BTreeSet<u32>> = HashMap::new();
    for u in updates {
        targets.entry(u.row).or_default().insert(u.col);
    }

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());

    // Pending target columns for the <row> currently being copied.
    let mut current_row: u32 = 0;
    let mut pending: BTreeSet<u32> = BTreeSet::new();
    // Depth counter while skipping the children of a replaced <c> element.
    let mut skip_depth: usize = 0;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                    continue;
                }
                match e.local_name().as_ref() {
                    b"row" => {
                        current_row = attr_value(&e, b"r")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                        pending = targets.remove(&current_row).unwrap_or_default();
                        writer.write_event(Event::Start(e.into_owned()))?;
                    }
                    b"c" if !pending.is_empty() => {
                        if replace_or_copy_cell(&mut writer, &e, current_row, &mut pending)? {
                            skip_depth = 1; // skip original <c>...</c> children
                        } else {
                            writer.write_event(Event::Start(e.into_owned()))?;
                        }
                    }
                    _ => writer.write_event(Event::Start(e.into_owned()))?,
                }
            }
            Event::Empty(e) => {
                if skip_depth > 0 {
                    continue;
                }
                if e.local_name().as_ref() == b"c" && !pending.is_empty() {
                    if !replace_or_copy_cell(&mut writer, &e, current_row, &mut pending)? {
                        writer.write_event(Event::Empty(e.into_owned()))?;
                    }
                } else {
                    writer.write_event(Event::Empty(e.into_owned()))?;
                }
            }
            Event::End(e) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    continue;
                }
                if e.local_name().as_ref() == b"row" {
                    // Target cells the row did not contain go before the row end.
                    for col in std::mem::take(&mut pending) {
                        write_status_cell(&mut writer, col, current_row, None)?;
                    }
                }
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Eof => break,
            other => {
                if skip_depth == 0 {
                    writer.write_event(other.into_owned())?;
                }
            }
        }
    }

    for (row, cols) in &targets {
        // Should not occur: every tracked row carried data, so its <row>
        // element exists in the sheet part.
        warn!(row, cols = cols.len(), "status row not found in sheet XML");
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| DocmillError::Xml(format!("patched sheet is not UTF-8: {}", e)))
}

/// If `cell` sits in a target column, write the replacement status cell (and
/// any pending cells from earlier columns) and report `true`. Otherwise emit
/// pending cells that belong before this one and report `false`.
fn replace_or_copy_cell(
    writer: &mut Writer<Vec<u8>>,
    cell: &BytesStart,
    row: u32,
    pending: &mut BTreeSet<u32>,
) -> DocmillResult<bool> {
    let cell_ref = attr_value(cell, b"r").unwrap_or_default();
    let (col, _) = parse_cell_ref(&cell_ref);

    let earlier: Vec<u32> = pending.range(..col).copied().collect();
    for c in earlier {
        pending.remove(&c);
        write_status_cell(writer, c, row, None)?;
    }

    if pending.remove(&col) {
        let style = attr_value(cell, b"s");
        write_status_cell(writer, col, row, style.as_deref())?;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn write_status_cell(
    writer: &mut Writer<Vec<u8>>,
    col: u32,
    row: u32,
    style: Option<&str>,
) -> DocmillResult<()> {
    let cell_ref = format!("{}{}", column_letters(col), row);
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", cell_ref.as_str()));
    if let Some(s) = style {
        cell.push_attribute(("s", s));
    }
    cell.push_attribute(("t", "inlineStr"));
    writer.write_event(Event::Start(cell))?;
    writer.write_event(Event::Start(BytesStart::new("is")))?;
    writer.write_event(Event::Start(BytesStart::new("t")))?;
    writer.write_event(Event::Text(BytesText::new(STATUS_YES)))?;
    writer.write_event(Event::End(BytesEnd::new("t")))?;
    writer.write_event(Event::End(BytesEnd::new("is")))?;
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// 0-based column index → spreadsheet letters ("A", "Z", "AA", ...).
pub(crate) fn column_letters(col: u32) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// "G5" → (6, 5): 0-based column, 1-based row.
fn parse_cell_ref(cell_ref: &str) -> (u32, u32) {
    let mut col = 0u32;
    let mut row = 0u32;
    for ch in cell_ref.chars() {
        if ch.is_ascii_alphabetic() {
            col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        } else if let Some(d) = ch.to_digit(10) {
            row = row * 10 + d;
        }
    }
    (col.saturating_sub(1), row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn column_letter_conversions() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(parse_cell_ref("A2"), (0, 2));
        assert_eq!(parse_cell_ref("AA10"), (26, 10));
    }

    #[test]
    fn patch_replaces_existing_cell_keeping_style() {
        let xml = r#"<worksheet><sheetData><row r="2"><c r="A2" t="s"><v>0</v></c><c r="B2" s="3" t="s"><v>1</v></c></row></sheetData></worksheet>"#;
        let out = patch_sheet_xml(xml, &[StatusUpdate { row: 2, col: 1 }]).unwrap();
        assert!(out.contains(r#"<c r="B2" s="3" t="inlineStr"><is><t>Yes</t></is></c>"#));
        assert!(out.contains(r#"<c r="A2" t="s"><v>0</v></c>"#));
    }

    #[test]
    fn patch_inserts_missing_cell_in_column_order() {
        let xml = r#"<worksheet><sheetData><row r="3"><c r="A3"><v>1</v></c><c r="D3"><v>2</v></c></row></sheetData></worksheet>"#;
        let out = patch_sheet_xml(xml, &[StatusUpdate { row: 3, col: 1 }]).unwrap();
        let a = out.find(r#"<c r="A3">"#).unwrap();
        let b = out.find(r#"<c r="B3" t="inlineStr">"#).unwrap();
        let d = out.find(r#"<c r="D3">"#).unwrap();
        assert!(a < b && b < d);
    }

    #[test]
    fn patch_appends_cell_past_row_end() {
        let xml = r#"<worksheet><sheetData><row r="2"><c r="A2"><v>1</v></c></row></sheetData></worksheet>"#;
        let out = patch_sheet_xml(xml, &[StatusUpdate { row: 2, col: 6 }]).unwrap();
        assert!(out.contains(r#"<c r="G2" t="inlineStr"><is><t>Yes</t></is></c></row>"#));
    }

    #[test]
    fn patch_leaves_other_rows_alone() {
        let xml = r#"<worksheet><sheetData><row r="2"><c r="A2"><v>1</v></c></row><row r="3"><c r="A3"><v>2</v></c></row></sheetData></worksheet>"#;
        let out = patch_sheet_xml(xml, &[StatusUpdate { row: 3, col: 0 }]).unwrap();
        assert!(out.contains(r#"<c r="A2"><v>1</v></c>"#));
        assert!(out.contains(r#"<c r="A3" t="inlineStr"><is><t>Yes</t></is></c>"#));
    }

    #[test]
    fn patch_two_cells_same_row() {
        let xml = r#"<worksheet><sheetData><row r="2"><c r="A2"><v>1</v></c><c r="C2"><v>2</v></c></row></sheetData></worksheet>"#;
        let out = patch_sheet_xml(
            xml,
            &[
                StatusUpdate { row: 2, col: 1 },
                StatusUpdate { row: 2, col: 2 },
            ],
        )
        .unwrap();
        assert!(out.contains(r#"<c r="B2" t="inlineStr"><is><t>Yes</t></is></c>"#));
        assert!(out.contains(r#"<c r="C2" t="inlineStr"><is><t>Yes</t></is></c>"#));
        assert!(!out.contains(r#"<v>2</v>"#));
    }
}
