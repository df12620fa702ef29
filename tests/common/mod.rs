//! Shared fixtures: a minimal Word template and spreadsheet builders.

#![allow(dead_code)]

use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p/></w:body></w:document>"#;

const SETTINGS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:zoom w:percent="100"/></w:settings>"#;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/settings.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml"/>
</Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const SEEDED_CUSTOM_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/custom-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">
<property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="2" name="System Name"><vt:lpwstr>PLACEHOLDER</vt:lpwstr></property>
</Properties>"#;

/// Write a minimal but valid Word template to `path`.
///
/// With `seeded` the package ships a `docProps/custom.xml` containing a
/// placeholder "System Name" property, like templates exported from Word.
pub fn write_template(path: &Path, seeded: bool) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(CONTENT_TYPES_XML.as_bytes()).unwrap();

    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(ROOT_RELS_XML.as_bytes()).unwrap();

    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(DOCUMENT_XML.as_bytes()).unwrap();

    zip.start_file("word/settings.xml", options).unwrap();
    zip.write_all(SETTINGS_XML.as_bytes()).unwrap();

    if seeded {
        zip.start_file("docProps/custom.xml", options).unwrap();
        zip.write_all(SEEDED_CUSTOM_XML.as_bytes()).unwrap();
    }

    zip.finish().unwrap();
}

/// A template that ships no `word/settings.xml` at all.
pub fn write_template_without_settings(path: &Path) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(CONTENT_TYPES_XML.as_bytes()).unwrap();

    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(ROOT_RELS_XML.as_bytes()).unwrap();

    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(DOCUMENT_XML.as_bytes()).unwrap();

    zip.finish().unwrap();
}

/// Write a workbook with an "Applications" sheet: header row plus the given
/// data rows, in the column order given by `headers`.
pub fn write_workbook(path: &Path, headers: &[&str], rows: &[Vec<&str>]) {
    write_workbook_at(path, 0, 0, headers, rows);
}

/// Like [`write_workbook`], but with the header row placed at
/// `(first_row, first_col)` so the used range does not start at A1.
pub fn write_workbook_at(
    path: &Path,
    first_row: u32,
    first_col: u16,
    headers: &[&str],
    rows: &[Vec<&str>],
) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Applications").unwrap();

    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string(first_row, first_col + col as u16, *header)
            .unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet
                    .write_string(first_row + (r + 1) as u32, first_col + c as u16, *value)
                    .unwrap();
            }
        }
    }

    workbook.save(path).unwrap();
}

/// Read a named entry of a zip package into a string.
pub fn read_zip_entry(path: &Path, name: &str) -> String {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut content = String::new();
    entry.read_to_string(&mut content).unwrap();
    content
}
