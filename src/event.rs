use crate::{AxmlError, Result};
use std::fmt;

/// Start or end of a namespace scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEvent {
    pub line: u32,
    pub prefix: Option<String>,
    pub uri: Option<String>,
}

/// Value carried by an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// The attribute references a pool string; `None` if it did not resolve
    Text(Option<String>),
    /// Raw typed data, left uninterpreted
    Data(i32),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(Some(text)) => f.write_str(text),
            AttributeValue::Text(None) => Ok(()),
            AttributeValue::Data(data) => write!(f, "{}", data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    pub name: Option<String>,
    /// Typed-value header word as stored (size, reserved byte, data type in the top byte)
    pub value_type: u32,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
    pub line: u32,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndElement {
    pub line: u32,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    pub line: u32,
    pub text: Option<String>,
}

/// Summary of the string pool, reported once it has been read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfo {
    pub strings: usize,
    pub styles: usize,
    pub utf8: bool,
}

/// One structural event, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StringPool(PoolInfo),
    ResourceMap(Vec<u32>),
    StartNamespace(NamespaceEvent),
    EndNamespace(NamespaceEvent),
    StartElement(StartElement),
    EndElement(EndElement),
    Text(TextEvent),
}

/// Receiver of decoded events
///
/// Returning an error from [`EventSink::event`] stops the decode and is
/// propagated to the caller. [`EventSink::fatal`] is called once when the
/// decode fails, after which no more events arrive.
pub trait EventSink {
    fn event(&mut self, event: Event) -> Result<()>;

    fn fatal(&mut self, _error: &AxmlError) {}
}

impl EventSink for Vec<Event> {
    fn event(&mut self, event: Event) -> Result<()> {
        self.push(event);
        Ok(())
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn event(&mut self, event: Event) -> Result<()> {
        (**self).event(event)
    }

    fn fatal(&mut self, error: &AxmlError) {
        (**self).fatal(error)
    }
}
