use crate::cursor::ByteCursor;
use crate::{AxmlError, CHUNK_HEADER_SIZE, Result, UTF8_FLAG};
use byteorder::{ByteOrder, LittleEndian};
use log::trace;
use std::io::Read;

/// Terminates the span list of one styled string.
const SPAN_END: u32 = 0xFFFF_FFFF;

/// Header words plus counts and region offsets, measured from the chunk start.
const POOL_HEADER_SIZE: u32 = 28;

/// How the length prefix of a UTF-8 pool string is read
///
/// AXML writers store two prefixes in front of every UTF-8 string: the
/// character count, then the byte count. `Compat` reads a single prefix and
/// takes it as the byte count, so it only decodes pools written with one
/// prefix per string. On a two-prefix pool every string comes out shifted by
/// one byte, ASCII included. `Android` reads the real layout and is what the
/// command line uses; `Compat` stays the library default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Utf8Lengths {
    /// A single length prefix taken as the byte count
    #[default]
    Compat,
    /// Character-count prefix followed by byte-count prefix
    Android,
}

/// A styled run inside a pool string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Tag name of the run, e.g. `b` or `i`
    pub name: Option<String>,
    pub first_char: u32,
    pub last_char: u32,
}

/// String table shared by every chunk of an AXML document
///
/// Strings are decoded on demand from the raw blob. An index that is
/// negative, out of range or points at undecodable bytes resolves to `None`.
#[derive(Debug, Clone)]
pub struct StringPool {
    is_utf8: bool,
    utf8_lengths: Utf8Lengths,
    string_offsets: Vec<u32>,
    style_offsets: Option<Vec<u32>>,
    raw_bytes: Vec<u8>,
    raw_styles: Option<Vec<u32>>,
}

impl StringPool {
    /// Read a string pool chunk body. The cursor must sit just past the
    /// 8-byte chunk header; `chunk_size` is the size that header declared.
    pub fn build<R: Read>(
        cursor: &mut ByteCursor<R>,
        chunk_size: u32,
        utf8_lengths: Utf8Lengths,
    ) -> Result<Self> {
        let chunk_start = cursor.position().saturating_sub(CHUNK_HEADER_SIZE);
        let malformed = |detail: String| AxmlError::MalformedStringPool {
            offset: chunk_start,
            detail,
        };

        let string_count = cursor.read_u32()?;
        let style_count = cursor.read_u32()?;
        let flags = cursor.read_u32()?;
        let strings_offset = cursor.read_u32()?;
        let styles_offset = cursor.read_u32()?;

        let tables_size = 4 * (u64::from(string_count) + u64::from(style_count));
        if u64::from(POOL_HEADER_SIZE) + tables_size > u64::from(chunk_size) {
            return Err(malformed(format!(
                "{} string and {} style offsets do not fit in a {}-byte chunk",
                string_count, style_count, chunk_size
            )));
        }
        if strings_offset > chunk_size || styles_offset > chunk_size {
            return Err(malformed(format!(
                "region offsets {} and {} lie past the chunk end {}",
                strings_offset, styles_offset, chunk_size
            )));
        }

        let string_offsets = cursor.read_u32_array(string_count)?;
        let style_offsets = if style_count != 0 {
            Some(cursor.read_u32_array(style_count)?)
        } else {
            None
        };

        let raw_bytes = if strings_offset == 0 && string_count == 0 {
            Vec::new()
        } else {
            let tables_end = cursor.position() - chunk_start;
            if strings_offset < tables_end {
                return Err(malformed(format!(
                    "strings region at {} overlaps the offset tables ending at {}",
                    strings_offset, tables_end
                )));
            }
            cursor.skip(strings_offset - tables_end)?;

            let region_end = if styles_offset != 0 {
                styles_offset
            } else {
                chunk_size
            };
            let size = region_end.checked_sub(strings_offset).ok_or_else(|| {
                malformed(format!(
                    "strings region start {} is past its end {}",
                    strings_offset, region_end
                ))
            })?;
            if size % 4 != 0 {
                return Err(malformed(format!(
                    "string data size is not a multiple of 4 ({})",
                    size
                )));
            }
            cursor.read_bytes(size)?
        };

        let raw_styles = if styles_offset != 0 {
            let here = cursor.position() - chunk_start;
            if styles_offset < here {
                return Err(malformed(format!(
                    "styles region at {} overlaps data ending at {}",
                    styles_offset, here
                )));
            }
            cursor.skip(styles_offset - here)?;

            let size = chunk_size - styles_offset;
            if size % 4 != 0 {
                return Err(malformed(format!(
                    "style data size is not a multiple of 4 ({})",
                    size
                )));
            }
            Some(cursor.read_u32_array(size / 4)?)
        } else {
            None
        };

        if let Some(bad) = string_offsets
            .iter()
            .find(|&&offset| offset as usize >= raw_bytes.len())
        {
            return Err(malformed(format!(
                "string offset {} is outside the {}-byte string data",
                bad,
                raw_bytes.len()
            )));
        }

        let pool = Self {
            is_utf8: flags & UTF8_FLAG != 0,
            utf8_lengths,
            string_offsets,
            style_offsets,
            raw_bytes,
            raw_styles,
        };
        trace!(
            "string pool: {} strings, {} styles, utf8={}",
            pool.len(),
            style_count,
            pool.is_utf8
        );
        Ok(pool)
    }

    /// Number of strings in the pool
    pub fn len(&self) -> usize {
        self.string_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.string_offsets.is_empty()
    }

    pub fn is_utf8(&self) -> bool {
        self.is_utf8
    }

    /// Number of strings that carry style spans
    pub fn style_count(&self) -> usize {
        self.style_offsets.as_ref().map_or(0, Vec::len)
    }

    /// Resolve a string reference
    pub fn get_string(&self, index: i32) -> Option<String> {
        let index = usize::try_from(index).ok()?;
        let offset = *self.string_offsets.get(index)? as usize;

        if self.is_utf8 {
            self.decode_utf8(offset)
        } else {
            self.decode_utf16(offset)
        }
    }

    /// Style runs of the string at `index`, if it is styled
    pub fn spans(&self, index: i32) -> Option<Vec<Span>> {
        let index = usize::try_from(index).ok()?;
        let offset = *self.style_offsets.as_ref()?.get(index)?;
        let mut words = self.raw_styles.as_ref()?.get(offset as usize / 4..)?.iter();

        let mut spans = Vec::new();
        loop {
            let name = *words.next()?;
            if name == SPAN_END {
                break;
            }
            let first_char = *words.next()?;
            let last_char = *words.next()?;
            spans.push(Span {
                name: self.get_string(name as i32),
                first_char,
                last_char,
            });
        }
        Some(spans)
    }

    fn decode_utf8(&self, offset: usize) -> Option<String> {
        let (length, start) = match self.utf8_lengths {
            Utf8Lengths::Compat => read_utf8_length(&self.raw_bytes, offset)?,
            Utf8Lengths::Android => {
                let (_chars, next) = read_utf8_length(&self.raw_bytes, offset)?;
                read_utf8_length(&self.raw_bytes, next)?
            }
        };
        let bytes = self.raw_bytes.get(start..start.checked_add(length)?)?;
        std::str::from_utf8(bytes).ok().map(str::to_owned)
    }

    fn decode_utf16(&self, offset: usize) -> Option<String> {
        let prefix = self.raw_bytes.get(offset..offset.checked_add(2)?)?;
        let units = LittleEndian::read_u16(prefix) as usize;
        let start = offset + 2;
        let bytes = self.raw_bytes.get(start..start.checked_add(units * 2)?)?;

        let mut code_units = vec![0u16; units];
        LittleEndian::read_u16_into(bytes, &mut code_units);
        String::from_utf16(&code_units).ok()
    }
}

/// One UTF-8 length prefix: lengths above 127 set the high bit of the first
/// byte and continue into a second byte. Returns the length and the offset
/// just past the prefix.
fn read_utf8_length(bytes: &[u8], offset: usize) -> Option<(usize, usize)> {
    let first = *bytes.get(offset)? as usize;
    if first & 0x80 != 0 {
        let second = *bytes.get(offset + 1)? as usize;
        Some((((first & 0x7F) << 8) | second, offset + 2))
    } else {
        Some((first, offset + 1))
    }
}
