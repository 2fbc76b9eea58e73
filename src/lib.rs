//! A library for decoding Android Binary XML (AXML) documents.
//!
//! AXML is the compiled form of `AndroidManifest.xml` and of layout resources
//! found inside APKs. This crate walks the chunk stream, resolves every string
//! reference through the embedded string pool and hands structured events to
//! an [`EventSink`]. Rendering sinks for XML text and a flat event listing are
//! included.
//!
//! # Examples
//!
//! ```no_run
//! use axmlview::{AxmlDecoder, Event};
//! use std::fs::File;
//!
//! let input = File::open("AndroidManifest.xml").unwrap();
//! let mut events: Vec<Event> = Vec::new();
//! AxmlDecoder::new(input).decode(&mut events).unwrap();
//!
//! // Or straight to XML text
//! let xml = axmlview::AxmlConverter::convert_bytes(&std::fs::read("AndroidManifest.xml").unwrap()).unwrap();
//! println!("{}", xml);
//! ```

use std::io;
use thiserror::Error;

mod binary_xml;
pub mod cli;
mod converter;
mod cursor;
mod event;
mod render;
mod string_pool;

pub use binary_xml::{AxmlDecoder, DecoderOptions};
pub use converter::{AxmlConverter, OutputFormat};
pub use cursor::ByteCursor;
pub use event::{
    Attribute, AttributeValue, EndElement, Event, EventSink, NamespaceEvent, PoolInfo,
    StartElement, TextEvent,
};
pub use render::{DumpSink, XmlSink};
pub use string_pool::{Span, StringPool, Utf8Lengths};

/// Error types for AXML decoding and rendering
#[derive(Error, Debug)]
pub enum AxmlError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("XML output error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid AXML container - document chunk type mismatch. Expected: {expected:#010x}, got: {actual:#010x}")]
    InvalidContainer { expected: u32, actual: u32 },
    #[error("Truncated input at offset {offset}: requested {requested} bytes, {available} available")]
    TruncatedInput {
        offset: u32,
        requested: u32,
        available: u32,
    },
    #[error("Malformed string pool at offset {offset}: {detail}")]
    MalformedStringPool { offset: u32, detail: String },
    #[error("Malformed resource map at offset {offset}: chunk size {size} leaves a partial id slot")]
    MalformedResourceMap { offset: u32, size: u32 },
    #[error("Invalid chunk size {size} at offset {offset}")]
    InvalidChunkSize { offset: u32, size: u32 },
    #[error("String reference at offset {offset} appears before any string pool chunk")]
    MissingStringPool { offset: u32 },
    #[error("Reserved field at offset {offset} is {found:#010x}, expected 0xffffffff")]
    UnexpectedSentinel { offset: u32, found: u32 },
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, AxmlError>;

// Chunk types - the low half is the resource type, the high half the header size
pub const CHUNK_XML: u32 = 0x0008_0003;
pub const CHUNK_STRING_POOL: u32 = 0x001C_0001;
pub const CHUNK_RESOURCE_MAP: u32 = 0x0008_0180;
pub const CHUNK_START_NAMESPACE: u32 = 0x0010_0100;
pub const CHUNK_END_NAMESPACE: u32 = 0x0010_0101;
pub const CHUNK_START_TAG: u32 = 0x0010_0102;
pub const CHUNK_END_TAG: u32 = 0x0010_0103;
pub const CHUNK_TEXT: u32 = 0x0010_0104;

/// Size of the `{type, size}` header that opens every chunk.
pub const CHUNK_HEADER_SIZE: u32 = 8;

/// Expected value of the reserved word following each node's line number.
pub const RESERVED_SENTINEL: u32 = 0xFFFF_FFFF;

/// String reference meaning "no string" (e.g. the default namespace).
pub const NO_INDEX: i32 = -1;

/// String pool flag selecting UTF-8 storage instead of UTF-16LE.
pub const UTF8_FLAG: u32 = 0x0000_0100;
