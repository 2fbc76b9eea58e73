use crate::event::{Attribute, Event, EventSink, NamespaceEvent};
use crate::{AxmlError, Result};
use log::warn;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent};
use std::io::Write;

const UNRESOLVED_NAME: &str = "unknown";

/// Renders events as indented XML text
///
/// Namespace declarations are attached to the element that follows them,
/// and names in a declared namespace are written with its prefix. Element
/// and attribute names that did not resolve are written as `unknown`.
pub struct XmlSink<W: Write> {
    writer: Writer<W>,
    pending: Vec<(String, String)>,
    bindings: Vec<(String, String)>,
}

impl<W: Write> XmlSink<W> {
    /// Create a sink and write the XML declaration
    pub fn new(output: W) -> Result<Self> {
        let mut writer = Writer::new_with_indent(output, b' ', 2);
        writer.write_event(XmlEvent::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(Self {
            writer,
            pending: Vec::new(),
            bindings: Vec::new(),
        })
    }

    /// Terminate the document and hand back the output
    pub fn finish(self) -> Result<W> {
        let mut output = self.writer.into_inner();
        writeln!(output)?;
        output.flush()?;
        Ok(output)
    }

    fn qualified(&self, namespace: Option<&str>, name: Option<&str>) -> String {
        let name = name.filter(|n| !n.is_empty()).unwrap_or(UNRESOLVED_NAME);
        let prefix = namespace.and_then(|uri| {
            self.bindings
                .iter()
                .rev()
                .find(|(_, bound)| bound == uri)
                .map(|(prefix, _)| prefix.as_str())
        });
        match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, name),
            _ => name.to_string(),
        }
    }

    fn attribute_pair(&self, attribute: &Attribute) -> (String, String) {
        (
            self.qualified(attribute.namespace.as_deref(), attribute.name.as_deref()),
            attribute.value.to_string(),
        )
    }

    fn start_namespace(&mut self, event: NamespaceEvent) {
        let binding = (
            event.prefix.unwrap_or_default(),
            event.uri.unwrap_or_default(),
        );
        self.pending.push(binding.clone());
        self.bindings.push(binding);
    }

    fn end_namespace(&mut self, event: &NamespaceEvent) {
        let prefix = event.prefix.as_deref().unwrap_or_default();
        if let Some(index) = self.bindings.iter().rposition(|(p, _)| p == prefix) {
            self.bindings.remove(index);
        }
    }
}

impl<W: Write> EventSink for XmlSink<W> {
    fn event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::StringPool(_) | Event::ResourceMap(_) => {}
            Event::StartNamespace(ns) => self.start_namespace(ns),
            Event::EndNamespace(ns) => self.end_namespace(&ns),
            Event::StartElement(element) => {
                let name = self.qualified(element.namespace.as_deref(), element.name.as_deref());
                let attributes: Vec<(String, String)> = element
                    .attributes
                    .iter()
                    .map(|attribute| self.attribute_pair(attribute))
                    .collect();

                let mut start = BytesStart::new(name);
                for (prefix, uri) in self.pending.drain(..) {
                    let key = if prefix.is_empty() {
                        "xmlns".to_string()
                    } else {
                        format!("xmlns:{}", prefix)
                    };
                    start.push_attribute((key.as_str(), uri.as_str()));
                }
                for (key, value) in &attributes {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                self.writer.write_event(XmlEvent::Start(start))?;
            }
            Event::EndElement(element) => {
                let name = self.qualified(element.namespace.as_deref(), element.name.as_deref());
                self.writer.write_event(XmlEvent::End(BytesEnd::new(name)))?;
            }
            Event::Text(text) => {
                if let Some(text) = text.text.filter(|t| !t.is_empty()) {
                    self.writer.write_event(XmlEvent::Text(BytesText::new(&text)))?;
                }
            }
        }
        Ok(())
    }
}

/// Writes one line per event, in the style of a chunk dump
pub struct DumpSink<W: Write> {
    output: W,
}

impl<W: Write> DumpSink<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

fn or_null(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("null")
}

impl<W: Write> EventSink for DumpSink<W> {
    fn event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::StringPool(info) => {
                writeln!(
                    self.output,
                    "String pool: {} strings, {} styles, {}",
                    info.strings,
                    info.styles,
                    if info.utf8 { "UTF-8" } else { "UTF-16" }
                )?;
            }
            Event::ResourceMap(ids) => {
                let ids: Vec<String> = ids
                    .iter()
                    .map(|id| format!("0x{}", hex::encode(id.to_be_bytes())))
                    .collect();
                writeln!(self.output, "Resource ids: {}", ids.join(" "))?;
            }
            Event::StartNamespace(ns) => {
                writeln!(
                    self.output,
                    "Start Namespace: {} = {}",
                    or_null(&ns.prefix),
                    or_null(&ns.uri)
                )?;
            }
            Event::EndNamespace(ns) => {
                writeln!(self.output, "End Namespace: {}", or_null(&ns.prefix))?;
            }
            Event::StartElement(element) => {
                writeln!(self.output, "Start Tag: {}", or_null(&element.name))?;
                for attribute in &element.attributes {
                    writeln!(
                        self.output,
                        "  Attribute: {} = {}",
                        or_null(&attribute.name),
                        attribute.value
                    )?;
                }
            }
            Event::EndElement(element) => {
                writeln!(self.output, "End Tag: {}", or_null(&element.name))?;
            }
            Event::Text(text) => {
                writeln!(self.output, "Text: {}", or_null(&text.text))?;
            }
        }
        Ok(())
    }

    fn fatal(&mut self, error: &AxmlError) {
        if let Err(e) = writeln!(self.output, "Error: {}", error) {
            warn!("Failed to write error report: {}", e);
        }
    }
}
