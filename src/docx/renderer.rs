//! Template instantiation.
//!
//! The template .docx is read fully into memory once at startup; each render
//! writes a complete new package to the output path with the row's fields
//! upserted into `docProps/custom.xml`. Templates without a custom-properties
//! part get one, including the `[Content_Types].xml` and `_rels/.rels`
//! registrations Word requires. `word/settings.xml` gains
//! `<w:updateFields w:val="true"/>` so DOCPROPERTY fields refresh when the
//! document is first opened; a template shipping no settings part gets a
//! minimal one, registered the same way.

use crate::docx::properties::CustomProperties;
use crate::error::{DocmillError, DocmillResult};
use crate::types::FieldAssignment;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs::File;
use std::io::{Cursor, Read, Write as _};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const CUSTOM_PART: &str = "docProps/custom.xml";
const SETTINGS_PART: &str = "word/settings.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const ROOT_RELS_PART: &str = "_rels/.rels";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";

const CUSTOM_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.custom-properties+xml";
const CUSTOM_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/custom-properties";
const SETTINGS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml";
const SETTINGS_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings";

/// Settings part written for templates that ship without one.
const DEFAULT_SETTINGS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:updateFields w:val="true"/></w:settings>"#;

/// An in-memory template package, opened once per run.
#[derive(Debug)]
pub struct DocxTemplate {
    entries: Vec<(String, Vec<u8>)>,
    base_properties: CustomProperties,
    has_custom_part: bool,
    has_settings_part: bool,
}

impl DocxTemplate {
    /// Read and validate the template. Failure here is fatal to the run.
    pub fn open(path: &Path) -> DocmillResult<Self> {
        let file = File::open(path).map_err(|e| {
            DocmillError::Template(format!("cannot open {}: {}", path.display(), e))
        })?;
        let mut archive = ZipArchive::new(file).map_err(|e| {
            DocmillError::Template(format!("{} is not a .docx package: {}", path.display(), e))
        })?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            entries.push((entry.name().to_string(), data));
        }

        if !entries.iter().any(|(name, _)| name == "word/document.xml") {
            return Err(DocmillError::Template(format!(
                "{} has no word/document.xml; not a Word document",
                path.display()
            )));
        }

        let (base_properties, has_custom_part) = match entries
            .iter()
            .find(|(name, _)| name == CUSTOM_PART)
        {
            Some((_, data)) => {
                let xml = std::str::from_utf8(data).map_err(|e| {
                    DocmillError::Template(format!("custom.xml is not UTF-8: {}", e))
                })?;
                (CustomProperties::from_xml(xml)?, true)
            }
            None => (CustomProperties::new(), false),
        };

        let has_settings_part = entries.iter().any(|(name, _)| name == SETTINGS_PART);

        debug!(
            parts = entries.len(),
            seeded = base_properties.len(),
            "template loaded"
        );

        Ok(Self {
            entries,
            base_properties,
            has_custom_part,
            has_settings_part,
        })
    }

    /// Names and values of properties already present on the template.
    pub fn seeded_properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.base_properties.iter()
    }

    /// Write one rendered instance to `output`. Errors are row-local; the
    /// caller absorbs them into a failed outcome.
    pub fn render(&self, output: &Path, fields: &[FieldAssignment]) -> DocmillResult<()> {
        let mut properties = self.base_properties.clone();
        for field in fields {
            properties.upsert(field.name.clone(), field.value.clone());
        }
        let custom_xml = properties.to_xml()?;

        let out = File::create(output).map_err(|e| {
            DocmillError::Render(format!("cannot create {}: {}", output.display(), e))
        })?;
        let mut writer = ZipWriter::new(out);
        let options = SimpleFileOptions::default();

        let mut has_document_rels = false;
        for (name, data) in &self.entries {
            writer.start_file(name.clone(), options)?;
            match name.as_str() {
                CUSTOM_PART => writer.write_all(custom_xml.as_bytes())?,
                SETTINGS_PART => {
                    let xml = std::str::from_utf8(data)
                        .map_err(|e| DocmillError::Render(format!("settings.xml: {}", e)))?;
                    writer.write_all(ensure_update_fields(xml)?.as_bytes())?;
                }
                CONTENT_TYPES_PART if !self.has_custom_part || !self.has_settings_part => {
                    let mut xml = std::str::from_utf8(data)
                        .map_err(|e| DocmillError::Render(format!("content types: {}", e)))?
                        .to_string();
                    if !self.has_custom_part {
                        xml = register_content_type(&xml, CUSTOM_PART, CUSTOM_CONTENT_TYPE)?;
                    }
                    if !self.has_settings_part {
                        xml = register_content_type(&xml, SETTINGS_PART, SETTINGS_CONTENT_TYPE)?;
                    }
                    writer.write_all(xml.as_bytes())?;
                }
                ROOT_RELS_PART if !self.has_custom_part => {
                    let xml = std::str::from_utf8(data)
                        .map_err(|e| DocmillError::Render(format!("root rels: {}", e)))?;
                    writer.write_all(
                        register_relationship(xml, CUSTOM_REL_TYPE, CUSTOM_PART)?.as_bytes(),
                    )?;
                }
                DOCUMENT_RELS_PART => {
                    has_document_rels = true;
                    if self.has_settings_part {
                        writer.write_all(data)?;
                    } else {
                        let xml = std::str::from_utf8(data)
                            .map_err(|e| DocmillError::Render(format!("document rels: {}", e)))?;
                        writer.write_all(
                            register_relationship(xml, SETTINGS_REL_TYPE, "settings.xml")?
                                .as_bytes(),
                        )?;
                    }
                }
                _ => writer.write_all(data)?,
            }
        }

        if !self.has_custom_part {
            writer.start_file(CUSTOM_PART, options)?;
            writer.write_all(custom_xml.as_bytes())?;
        }

        if !self.has_settings_part {
            writer.start_file(SETTINGS_PART, options)?;
            writer.write_all(DEFAULT_SETTINGS_XML.as_bytes())?;
            if !has_document_rels {
                writer.start_file(DOCUMENT_RELS_PART, options)?;
                writer.write_all(fresh_document_rels().as_bytes())?;
            }
        }

        writer.finish()?;
        Ok(())
    }
}

fn fresh_document_rels() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}" Target="settings.xml"/></Relationships>"#,
        SETTINGS_REL_TYPE
    )
}

/// Set `<w:updateFields w:val="true"/>` in settings.xml, replacing any
/// existing element of that name.
fn ensure_update_fields(xml: &str) -> DocmillResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut skip_depth: usize = 0;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                    continue;
                }
                if e.local_name().as_ref() == b"updateFields" {
                    skip_depth = 1; // replaced by the element written below
                    continue;
                }
                let is_settings = e.local_name().as_ref() == b"settings";
                writer.write_event(Event::Start(e.into_owned()))?;
                if is_settings {
                    let mut elem = BytesStart::new("w:updateFields");
                    elem.push_attribute(("w:val", "true"));
                    writer.write_event(Event::Empty(elem))?;
                }
            }
            Event::Empty(e) => {
                if skip_depth > 0 || e.local_name().as_ref() == b"updateFields" {
                    continue;
                }
                writer.write_event(Event::Empty(e.into_owned()))?;
            }
            Event::End(e) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    continue;
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

    into_xml_string(writer)
}

/// Add an override for `part` to `[Content_Types].xml`.
fn register_content_type(xml: &str, part: &str, content_type: &str) -> DocmillResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    loop {
        match reader.read_event()? {
            Event::End(e) if e.local_name().as_ref() == b"Types" => {
                let mut elem = BytesStart::new("Override");
                elem.push_attribute(("PartName", format!("/{}", part).as_str()));
                elem.push_attribute(("ContentType", content_type));
                writer.write_event(Event::Empty(elem))?;
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
    }

    into_xml_string(writer)
}

/// Add a relationship of `rel_type` to `target` in a relationships part, with
/// an id that does not collide with the part's own.
fn register_relationship(xml: &str, rel_type: &str, target: &str) -> DocmillResult<String> {
    let mut existing_ids = Vec::new();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"Id" {
                        existing_ids.push(String::from_utf8_lossy(&attr.value).into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut n = existing_ids.len() + 1;
    while existing_ids.iter().any(|id| id == &format!("rId{}", n)) {
        n += 1;
    }
    let rel_id = format!("rId{}", n);

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    loop {
        match reader.read_event()? {
            Event::End(e) if e.local_name().as_ref() == b"Relationships" => {
                let mut elem = BytesStart::new("Relationship");
                elem.push_attribute(("Id", rel_id.as_str()));
                elem.push_attribute(("Type", rel_type));
                elem.push_attribute(("Target", target));
                writer.write_event(Event::Empty(elem))?;
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
    }

    into_xml_string(writer)
}

fn into_xml_string(writer: Writer<Cursor<Vec<u8>>>) -> DocmillResult<String> {
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| DocmillError::Xml(format!("rewritten part is not UTF-8: {}", e)))
}
