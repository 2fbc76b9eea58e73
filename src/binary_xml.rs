use crate::cursor::ByteCursor;
use crate::event::{
    Attribute, AttributeValue, EndElement, Event, EventSink, NamespaceEvent, PoolInfo,
    StartElement, TextEvent,
};
use crate::string_pool::{StringPool, Utf8Lengths};
use crate::{AxmlError, NO_INDEX, RESERVED_SENTINEL, Result};
use crate::{CHUNK_END_NAMESPACE, CHUNK_END_TAG, CHUNK_HEADER_SIZE, CHUNK_RESOURCE_MAP};
use crate::{CHUNK_START_NAMESPACE, CHUNK_START_TAG, CHUNK_STRING_POOL, CHUNK_TEXT, CHUNK_XML};
use log::{debug, trace, warn};
use std::io::Read;

// Fixed body sizes that follow the 8-byte chunk header
const NAMESPACE_BODY: u32 = 16;
const START_TAG_BODY: u32 = 28;
const ATTRIBUTE_SIZE: u32 = 20;
const END_TAG_BODY: u32 = 16;
const TEXT_BODY: u32 = 20;
const STRING_POOL_BODY: u32 = 20;

/// Decoder behaviour switches
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderOptions {
    pub utf8_lengths: Utf8Lengths,
    /// Fail on reserved words that are not `0xFFFFFFFF` instead of warning
    pub strict_sentinels: bool,
}

/// Chunk dispatcher that turns an AXML stream into events
pub struct AxmlDecoder<R: Read> {
    input: ByteCursor<R>,
    options: DecoderOptions,
    string_pool: Option<StringPool>,
    resource_ids: Vec<u32>,
}

impl<R: Read> AxmlDecoder<R> {
    /// Create a decoder with default options
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecoderOptions::default())
    }

    pub fn with_options(reader: R, options: DecoderOptions) -> Self {
        Self {
            input: ByteCursor::new(reader),
            options,
            string_pool: None,
            resource_ids: Vec::new(),
        }
    }

    /// Decode the whole document, delivering events to `sink` in order
    ///
    /// On failure the sink's `fatal` hook is told why before the error is
    /// returned. Events already delivered stay delivered.
    pub fn decode<S: EventSink>(&mut self, mut sink: S) -> Result<()> {
        match self.run(&mut sink) {
            Ok(()) => Ok(()),
            Err(e) => {
                sink.fatal(&e);
                Err(e)
            }
        }
    }

    /// The string pool, once its chunk has been read
    pub fn string_pool(&self) -> Option<&StringPool> {
        self.string_pool.as_ref()
    }

    /// Resource ids collected from resource map chunks
    pub fn resource_ids(&self) -> &[u32] {
        &self.resource_ids
    }

    fn run<S: EventSink>(&mut self, sink: &mut S) -> Result<()> {
        let container = self.input.read_u32()?;
        if container != CHUNK_XML {
            return Err(AxmlError::InvalidContainer {
                expected: CHUNK_XML,
                actual: container,
            });
        }

        let file_size = self.input.read_u32()?;
        debug!("document size: {}", file_size);

        while self.input.position() < file_size {
            if let Some(event) = self.process_chunk()? {
                sink.event(event)?;
            }
        }

        Ok(())
    }

    /// Read one chunk. The event is only returned once the whole chunk has
    /// been consumed; no handler reads past the declared size.
    fn process_chunk(&mut self) -> Result<Option<Event>> {
        let start = self.input.position();
        let chunk_type = self.input.read_u32()?;
        let size = self.input.read_u32()?;
        debug!(
            "chunk type: {:#010x}, size: {}, offset: {}",
            chunk_type, size, start
        );

        if size < CHUNK_HEADER_SIZE {
            return Err(AxmlError::InvalidChunkSize {
                offset: start,
                size,
            });
        }
        let body_size = size - CHUNK_HEADER_SIZE;

        let required = match chunk_type {
            CHUNK_STRING_POOL => STRING_POOL_BODY,
            CHUNK_START_NAMESPACE | CHUNK_END_NAMESPACE => NAMESPACE_BODY,
            CHUNK_START_TAG => START_TAG_BODY,
            CHUNK_END_TAG => END_TAG_BODY,
            CHUNK_TEXT => TEXT_BODY,
            _ => 0,
        };
        if body_size < required {
            return Err(AxmlError::InvalidChunkSize {
                offset: start,
                size,
            });
        }

        let event = match chunk_type {
            CHUNK_STRING_POOL => {
                if self.string_pool.is_some() {
                    warn!("ignoring additional string pool at offset {}", start);
                    self.input.skip(body_size)?;
                    None
                } else {
                    let pool =
                        StringPool::build(&mut self.input, size, self.options.utf8_lengths)?;
                    let info = PoolInfo {
                        strings: pool.len(),
                        styles: pool.style_count(),
                        utf8: pool.is_utf8(),
                    };
                    self.string_pool = Some(pool);
                    Some(Event::StringPool(info))
                }
            }
            CHUNK_RESOURCE_MAP => Some(self.read_resource_map(start, body_size)?),
            CHUNK_START_NAMESPACE => Some(Event::StartNamespace(self.read_namespace(start)?)),
            CHUNK_END_NAMESPACE => Some(Event::EndNamespace(self.read_namespace(start)?)),
            CHUNK_START_TAG => Some(Event::StartElement(self.read_start_tag(start, size)?)),
            CHUNK_END_TAG => Some(Event::EndElement(self.read_end_tag(start)?)),
            CHUNK_TEXT => Some(Event::Text(self.read_text(start)?)),
            _ => {
                warn!(
                    "skipping unknown chunk type {:#010x} at offset {}",
                    chunk_type, start
                );
                self.input.skip(body_size)?;
                None
            }
        };

        let consumed = self.input.position() - start;
        if consumed < size {
            trace!("skipping {} trailing bytes of chunk at {}", size - consumed, start);
            self.input.skip(size - consumed)?;
        }

        Ok(event)
    }

    fn read_resource_map(&mut self, start: u32, body_size: u32) -> Result<Event> {
        if body_size % 4 != 0 {
            return Err(AxmlError::MalformedResourceMap {
                offset: start,
                size: body_size + CHUNK_HEADER_SIZE,
            });
        }
        let ids = self.input.read_u32_array(body_size / 4)?;
        trace!("resource map: {} ids", ids.len());
        self.resource_ids.extend_from_slice(&ids);
        Ok(Event::ResourceMap(ids))
    }

    fn read_namespace(&mut self, start: u32) -> Result<NamespaceEvent> {
        let line = self.input.read_u32()?;
        self.skip_sentinel()?;
        let prefix = self.input.read_i32()?;
        let uri = self.input.read_i32()?;

        let pool = self.pool(start)?;
        Ok(NamespaceEvent {
            line,
            prefix: pool.get_string(prefix),
            uri: pool.get_string(uri),
        })
    }

    fn read_start_tag(&mut self, start: u32, size: u32) -> Result<StartElement> {
        let line = self.input.read_u32()?;
        self.skip_sentinel()?;
        let namespace = self.input.read_i32()?;
        let name = self.input.read_i32()?;
        self.input.skip(4)?; // attribute start / size
        let attribute_count = self.input.read_u32()? & 0xFFFF;
        self.input.skip(4)?; // id / class / style attribute indices

        let attributes_size = u64::from(attribute_count) * u64::from(ATTRIBUTE_SIZE);
        if u64::from(CHUNK_HEADER_SIZE + START_TAG_BODY) + attributes_size > u64::from(size) {
            return Err(AxmlError::InvalidChunkSize {
                offset: start,
                size,
            });
        }

        let mut raw_attributes = Vec::with_capacity(attribute_count as usize);
        for _ in 0..attribute_count {
            raw_attributes.push(RawAttribute {
                namespace: self.input.read_i32()?,
                name: self.input.read_i32()?,
                value_string: self.input.read_i32()?,
                value_type: self.input.read_u32()?,
                value_data: self.input.read_i32()?,
            });
        }

        let pool = self.pool(start)?;
        let attributes = raw_attributes
            .into_iter()
            .map(|raw| Attribute {
                namespace: pool.get_string(raw.namespace),
                name: pool.get_string(raw.name),
                value_type: raw.value_type,
                value: if raw.value_string != NO_INDEX {
                    AttributeValue::Text(pool.get_string(raw.value_string))
                } else {
                    AttributeValue::Data(raw.value_data)
                },
            })
            .collect();

        Ok(StartElement {
            line,
            namespace: pool.get_string(namespace),
            name: pool.get_string(name),
            attributes,
        })
    }

    fn read_end_tag(&mut self, start: u32) -> Result<EndElement> {
        let line = self.input.read_u32()?;
        self.skip_sentinel()?;
        let namespace = self.input.read_i32()?;
        let name = self.input.read_i32()?;

        let pool = self.pool(start)?;
        Ok(EndElement {
            line,
            namespace: pool.get_string(namespace),
            name: pool.get_string(name),
        })
    }

    fn read_text(&mut self, start: u32) -> Result<TextEvent> {
        let line = self.input.read_u32()?;
        self.skip_sentinel()?;
        let text = self.input.read_i32()?;
        self.input.skip(8)?; // typed value, unused for text

        Ok(TextEvent {
            line,
            text: self.pool(start)?.get_string(text),
        })
    }

    fn skip_sentinel(&mut self) -> Result<()> {
        let offset = self.input.position();
        let found = self.input.read_u32()?;
        if found != RESERVED_SENTINEL {
            if self.options.strict_sentinels {
                return Err(AxmlError::UnexpectedSentinel { offset, found });
            }
            warn!("reserved field at offset {} is {:#010x}", offset, found);
        }
        Ok(())
    }

    fn pool(&self, chunk_start: u32) -> Result<&StringPool> {
        self.string_pool
            .as_ref()
            .ok_or(AxmlError::MissingStringPool {
                offset: chunk_start,
            })
    }
}

struct RawAttribute {
    namespace: i32,
    name: i32,
    value_string: i32,
    value_type: u32,
    value_data: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn chunk(chunk_type: u32, body: &[u32]) -> Vec<u8> {
        let mut out = words(&[chunk_type, 8 + 4 * body.len() as u32]);
        out.extend(words(body));
        out
    }

    /// UTF-8 pool with single-byte length prefixes
    fn pool(strings: &[&str]) -> Vec<u8> {
        let mut offsets = Vec::new();
        let mut raw = Vec::new();
        for s in strings {
            offsets.push(raw.len() as u32);
            raw.push(s.len() as u8);
            raw.extend_from_slice(s.as_bytes());
            raw.push(0);
        }
        while raw.len() % 4 != 0 {
            raw.push(0);
        }
        let strings_offset = 28 + 4 * offsets.len() as u32;
        let size = strings_offset + raw.len() as u32;

        let mut out = words(&[
            CHUNK_STRING_POOL,
            size,
            strings.len() as u32,
            0,
            crate::UTF8_FLAG,
            strings_offset,
            0,
        ]);
        out.extend(words(&offsets));
        out.extend(raw);
        out
    }

    fn document(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut out = words(&[CHUNK_XML, 8 + body.len() as u32]);
        out.extend(body);
        out
    }

    /// Decode, dropping the string pool summary
    fn decode(data: Vec<u8>, options: DecoderOptions) -> (Result<()>, Vec<Event>) {
        let mut events = Vec::new();
        let result = AxmlDecoder::with_options(Cursor::new(data), options).decode(&mut events);
        events.retain(|event| !matches!(event, Event::StringPool(_)));
        (result, events)
    }

    #[test]
    fn test_invalid_container() {
        let data = words(&[CHUNK_STRING_POOL, 8]);
        let (result, events) = decode(data, DecoderOptions::default());

        assert!(matches!(
            result,
            Err(AxmlError::InvalidContainer {
                expected: CHUNK_XML,
                actual: CHUNK_STRING_POOL,
            })
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn test_text_and_attribute_values() {
        let data = document(&[
            pool(&["root", "label", "hello"]),
            chunk(
                CHUNK_START_TAG,
                &[
                    3, RESERVED_SENTINEL, u32::MAX, 0, 0x0014_0014, 2, 0,
                    u32::MAX, 1, 2, 0x0300_0008, 2,
                    u32::MAX, 1, u32::MAX, 0x1000_0008, (-7i32) as u32,
                ],
            ),
            chunk(CHUNK_TEXT, &[4, RESERVED_SENTINEL, 2, 0, 0]),
            chunk(CHUNK_END_TAG, &[5, RESERVED_SENTINEL, u32::MAX, 0]),
        ]);

        let (result, events) = decode(data, DecoderOptions::default());
        result.unwrap();
        assert_eq!(
            events,
            vec![
                Event::StartElement(StartElement {
                    line: 3,
                    namespace: None,
                    name: Some("root".into()),
                    attributes: vec![
                        Attribute {
                            namespace: None,
                            name: Some("label".into()),
                            value_type: 0x0300_0008,
                            value: AttributeValue::Text(Some("hello".into())),
                        },
                        Attribute {
                            namespace: None,
                            name: Some("label".into()),
                            value_type: 0x1000_0008,
                            value: AttributeValue::Data(-7),
                        },
                    ],
                }),
                Event::Text(TextEvent {
                    line: 4,
                    text: Some("hello".into()),
                }),
                Event::EndElement(EndElement {
                    line: 5,
                    namespace: None,
                    name: Some("root".into()),
                }),
            ]
        );
    }

    #[test]
    fn test_resource_map() {
        let data = document(&[
            pool(&["a"]),
            chunk(CHUNK_RESOURCE_MAP, &[0x0101_021B, 0x0101_021C]),
        ]);
        let mut decoder = AxmlDecoder::new(Cursor::new(data));
        let mut events = Vec::new();
        decoder.decode(&mut events).unwrap();

        assert_eq!(decoder.resource_ids(), &[0x0101_021B, 0x0101_021C]);
        assert_eq!(
            events,
            vec![
                Event::StringPool(PoolInfo {
                    strings: 1,
                    styles: 0,
                    utf8: true,
                }),
                Event::ResourceMap(vec![0x0101_021B, 0x0101_021C]),
            ]
        );
        assert_eq!(decoder.string_pool().map(StringPool::len), Some(1));
    }

    #[test]
    fn test_resource_map_with_partial_slot() {
        let mut map = words(&[CHUNK_RESOURCE_MAP, 14, 0x0101_021B]);
        map.extend_from_slice(&[0, 0]);
        let (result, _) = decode(document(&[map]), DecoderOptions::default());

        assert!(matches!(
            result,
            Err(AxmlError::MalformedResourceMap { offset: 8, size: 14 })
        ));
    }

    #[test]
    fn test_unknown_chunk_is_skipped() {
        let data = document(&[
            pool(&["ns"]),
            chunk(0x0008_0200, &[1, 2]),
            chunk(CHUNK_END_NAMESPACE, &[9, RESERVED_SENTINEL, 0, u32::MAX]),
        ]);
        let (result, events) = decode(data, DecoderOptions::default());
        result.unwrap();

        assert_eq!(
            events,
            vec![Event::EndNamespace(NamespaceEvent {
                line: 9,
                prefix: Some("ns".into()),
                uri: None,
            })]
        );
    }

    #[test]
    fn test_trailing_chunk_bytes_are_skipped() {
        let data = document(&[
            pool(&["a"]),
            chunk(CHUNK_END_TAG, &[1, RESERVED_SENTINEL, u32::MAX, 0, 0xDEAD_BEEF]),
            chunk(CHUNK_END_TAG, &[2, RESERVED_SENTINEL, u32::MAX, 0]),
        ]);
        let (result, events) = decode(data, DecoderOptions::default());
        result.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_undersized_end_tag() {
        // declared size covers the header only; the next chunk must stay unread
        let pool_chunk = pool(&["a"]);
        let tag_offset = 8 + pool_chunk.len() as u32;
        let mut tag = words(&[CHUNK_END_TAG, 8]);
        tag.extend(words(&[1, RESERVED_SENTINEL, u32::MAX, 0]));

        let mut decoder = AxmlDecoder::new(Cursor::new(document(&[pool_chunk, tag])));
        let mut events = Vec::new();
        let result = decoder.decode(&mut events);

        assert!(matches!(
            result,
            Err(AxmlError::InvalidChunkSize { offset, size: 8 }) if offset == tag_offset
        ));
        assert_eq!(decoder.input.position(), tag_offset + 8);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_undersized_text_and_namespace() {
        for (chunk_type, body) in [
            (CHUNK_TEXT, vec![1, RESERVED_SENTINEL, 0, 0]),
            (CHUNK_START_NAMESPACE, vec![1, RESERVED_SENTINEL, 0]),
        ] {
            let data = document(&[pool(&["a"]), chunk(chunk_type, &body)]);
            let (result, events) = decode(data, DecoderOptions::default());
            assert!(matches!(result, Err(AxmlError::InvalidChunkSize { .. })));
            assert!(events.is_empty());
        }
    }

    #[test]
    fn test_attribute_count_beyond_chunk() {
        // claims two attributes but carries one
        let tag = chunk(
            CHUNK_START_TAG,
            &[
                1, RESERVED_SENTINEL, u32::MAX, 0, 0x0014_0014, 2, 0,
                u32::MAX, 0, u32::MAX, 0x1000_0008, 1,
            ],
        );
        let tag_offset = 8 + pool(&["a"]).len() as u32;
        let mut decoder = AxmlDecoder::new(Cursor::new(document(&[pool(&["a"]), tag])));
        let result = decoder.decode(Vec::new());

        assert!(matches!(
            result,
            Err(AxmlError::InvalidChunkSize { offset, size: 56 }) if offset == tag_offset
        ));
        assert_eq!(decoder.input.position(), tag_offset + 8 + START_TAG_BODY);
    }

    #[test]
    fn test_chunk_smaller_than_header() {
        let data = document(&[words(&[CHUNK_TEXT, 4])]);
        let (result, _) = decode(data, DecoderOptions::default());
        assert!(matches!(
            result,
            Err(AxmlError::InvalidChunkSize { offset: 8, size: 4 })
        ));
    }

    #[test]
    fn test_string_reference_before_pool() {
        let data = document(&[chunk(CHUNK_END_TAG, &[1, RESERVED_SENTINEL, u32::MAX, 0])]);
        let (result, events) = decode(data, DecoderOptions::default());

        assert!(matches!(result, Err(AxmlError::MissingStringPool { offset: 8 })));
        assert!(events.is_empty());
    }

    #[test]
    fn test_sentinel_policy() {
        let data = document(&[
            pool(&["a"]),
            chunk(CHUNK_END_TAG, &[1, 0, u32::MAX, 0]),
        ]);

        let (lenient, events) = decode(data.clone(), DecoderOptions::default());
        lenient.unwrap();
        assert_eq!(events.len(), 1);

        let strict = DecoderOptions {
            strict_sentinels: true,
            ..DecoderOptions::default()
        };
        let (result, events) = decode(data, strict);
        assert!(matches!(
            result,
            Err(AxmlError::UnexpectedSentinel { found: 0, .. })
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn test_second_string_pool_is_ignored() {
        let data = document(&[
            pool(&["first"]),
            pool(&["second"]),
            chunk(CHUNK_TEXT, &[1, RESERVED_SENTINEL, 0, 0, 0]),
        ]);
        let (result, events) = decode(data, DecoderOptions::default());
        result.unwrap();
        assert_eq!(
            events,
            vec![Event::Text(TextEvent {
                line: 1,
                text: Some("first".into()),
            })]
        );
    }

    #[test]
    fn test_fatal_hook_receives_error() {
        struct Recorder(Vec<String>);
        impl EventSink for Recorder {
            fn event(&mut self, _event: Event) -> Result<()> {
                Ok(())
            }
            fn fatal(&mut self, error: &AxmlError) {
                self.0.push(error.to_string());
            }
        }

        let mut data = document(&[pool(&["a"])]);
        data.truncate(data.len() - 4);
        let mut recorder = Recorder(Vec::new());
        let result = AxmlDecoder::new(Cursor::new(data)).decode(&mut recorder);

        assert!(matches!(result, Err(AxmlError::TruncatedInput { .. })));
        assert_eq!(recorder.0.len(), 1);
        assert!(recorder.0[0].contains("Truncated input"));
    }
}
