//! Custom document properties (`docProps/custom.xml`).
//!
//! Projected spreadsheet values land in the output document as string-typed
//! (`vt:lpwstr`) custom properties, which DOCPROPERTY fields in the template
//! body reference by name. Upserting an existing property keeps its pid, so
//! templates that ship with pre-seeded properties keep working.

use crate::error::{DocmillError, DocmillResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// Fixed format id for custom properties, per ECMA-376.
const FORMAT_ID: &str = "{D5CDD505-2E9C-101B-9397-08002B2CF9AE}";

const CUSTOM_PROPERTIES_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/custom-properties";

const VTYPES_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Property {
    name: String,
    value: String,
    pid: i32,
}

/// The document's custom property set, kept in pid order.
#[derive(Debug, Clone, Default)]
pub struct CustomProperties {
    properties: Vec<Property>,
    next_pid: i32,
}

impl CustomProperties {
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            next_pid: 2, // pids start at 2 per ECMA-376
        }
    }

    /// Insert or replace a string property. Replacement keeps the existing
    /// pid (delete-then-recreate semantics at the XML level).
    pub fn upsert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.properties.iter_mut().find(|p| p.name == name) {
            existing.value = value;
        } else {
            self.properties.push(Property {
                name,
                value,
                pid: self.next_pid,
            });
            self.next_pid += 1;
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
    }

    /// Serialize to `docProps/custom.xml` content.
    pub fn to_xml(&self) -> DocmillResult<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

        let mut root = BytesStart::new("Properties");
        root.push_attribute(("xmlns", CUSTOM_PROPERTIES_NS));
        root.push_attribute(("xmlns:vt", VTYPES_NS));
        writer.write_event(Event::Start(root))?;

        for prop in &self.properties {
            let mut elem = BytesStart::new("property");
            elem.push_attribute(("fmtid", FORMAT_ID));
            elem.push_attribute(("pid", prop.pid.to_string().as_str()));
            elem.push_attribute(("name", prop.name.as_str()));
            writer.write_event(Event::Start(elem))?;

            writer.write_event(Event::Start(BytesStart::new("vt:lpwstr")))?;
            writer.write_event(Event::Text(BytesText::new(&prop.value)))?;
            writer.write_event(Event::End(BytesEnd::new("vt:lpwstr")))?;

            writer.write_event(Event::End(BytesEnd::new("property")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("Properties")))?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| DocmillError::Xml(format!("invalid UTF-8: {}", e)))
    }

    /// Parse an existing `docProps/custom.xml`. Non-string property values
    /// are carried through as their text content; what matters for rendering
    /// is that their names and pids survive the upsert pass.
    pub fn from_xml(xml: &str) -> DocmillResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut properties: Vec<Property> = Vec::new();
        let mut max_pid = 1;
        let mut current_name: Option<String> = None;
        let mut current_pid: Option<i32> = None;
        let mut in_value = false;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) => {
                    if e.local_name().as_ref() == b"property" {
                        for attr in e.attributes().flatten() {
                            let value = String::from_utf8_lossy(&attr.value).into_owned();
                            match attr.key.as_ref() {
                                b"name" => current_name = Some(value),
                                b"pid" => {
                                    if let Ok(pid) = value.parse::<i32>() {
                                        current_pid = Some(pid);
                                        max_pid = max_pid.max(pid);
                                    }
                                }
                                _ => {}
                            }
                        }
                    } else if current_name.is_some() {
                        in_value = true;
                    }
                }
                Event::Text(ref t) if in_value => {
                    if let (Some(name), Some(pid)) = (current_name.take(), current_pid.take()) {
                        let value = t
                            .unescape()
                            .map_err(|e| DocmillError::Xml(e.to_string()))?
                            .into_owned();
                        properties.push(Property { name, value, pid });
                    }
                }
                Event::End(ref e) => {
                    if e.local_name().as_ref() == b"property" {
                        // Property with an empty value element.
                        if let (Some(name), Some(pid)) = (current_name.take(), current_pid.take())
                        {
                            properties.push(Property {
                                name,
                                value: String::new(),
                                pid,
                            });
                        }
                        in_value = false;
                    } else {
                        in_value = false;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        properties.sort_by_key(|p| p.pid);
        Ok(Self {
            properties,
            next_pid: max_pid + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn upsert_keeps_pid() {
        let mut props = CustomProperties::new();
        props.upsert("System Name", "Orders");
        props.upsert("Owner", "Finance");
        props.upsert("System Name", "Billing");

        assert_eq!(props.len(), 2);
        assert_eq!(props.get("System Name"), Some("Billing"));

        let xml = props.to_xml().unwrap();
        assert!(xml.contains(r#"pid="2" name="System Name""#));
        assert!(xml.contains(r#"pid="3" name="Owner""#));
    }

    #[test]
    fn xml_roundtrip() {
        let mut props = CustomProperties::new();
        props.upsert("System Name", "Orders");
        props.upsert("Division", "Finance & Ops");

        let xml = props.to_xml().unwrap();
        let parsed = CustomProperties::from_xml(&xml).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("System Name"), Some("Orders"));
        assert_eq!(parsed.get("Division"), Some("Finance & Ops"));
    }

    #[test]
    fn parses_template_seeded_properties() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/custom-properties"
            xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">
    <property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="2" name="System Name">
        <vt:lpwstr>PLACEHOLDER</vt:lpwstr>
    </property>
    <property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="3" name="Reviewed">
        <vt:bool>false</vt:bool>
    </property>
</Properties>"#;

        let mut props = CustomProperties::from_xml(xml).unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("System Name"), Some("PLACEHOLDER"));

        props.upsert("System Name", "Orders");
        let out = props.to_xml().unwrap();
        assert!(out.contains(r#"pid="2" name="System Name""#));
        assert!(out.contains("<vt:lpwstr>Orders</vt:lpwstr>"));
    }

    #[test]
    fn new_pids_continue_after_existing() {
        let xml = r#"<Properties><property fmtid="{D5CDD505-2E9C-101B-9397-08002B2CF9AE}" pid="7" name="Old"><vt:lpwstr>x</vt:lpwstr></property></Properties>"#;
        let mut props = CustomProperties::from_xml(xml).unwrap();
        props.upsert("New", "y");
        let out = props.to_xml().unwrap();
        assert!(out.contains(r#"pid="8" name="New""#));
    }
}
