//! Cross-reference table handling
//!
//! Both classic `xref` sections and cross-reference streams are read into
//! the same [`XRefTable`]. Sections are merged newest first: once an object
//! number has an entry, older sections cannot replace it.

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace, warn};

use super::lexer::Lexer;
use super::{Object, Stream};
use crate::error::{LocksmithError, LocksmithResult};

/// Highest object number a conforming file may use
pub(crate) const MAX_OBJECT_NUMBER: u32 = 8_388_607;

/// Object number `value`, rejected when above [`MAX_OBJECT_NUMBER`]
pub(crate) fn object_number(value: u64) -> LocksmithResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|number| *number <= MAX_OBJECT_NUMBER)
        .ok_or_else(|| LocksmithError::parse(format!("Object number {} out of range", value)))
}

/// Cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free entry
    Free { next: u32, generation: u16 },
    /// Object stored at a byte offset
    InUse { offset: u64, generation: u16 },
    /// Object stored inside an object stream
    Compressed { stream: u32, index: u32 },
}

/// Cross-reference index: object number to location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XRefTable {
    entries: BTreeMap<u32, XRefEntry>,
}

impl XRefTable {
    /// Create new cross-reference table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    pub fn insert(&mut self, number: u32, entry: XRefEntry) {
        self.entries.insert(number, entry);
    }

    pub fn get(&self, number: u32) -> Option<&XRefEntry> {
        self.entries.get(&number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &XRefEntry)> {
        self.entries.iter()
    }

    /// Merge an older section; existing entries win
    pub fn merge_older(&mut self, older: XRefTable) {
        for (number, entry) in older.entries {
            self.entries.entry(number).or_insert(entry);
        }
    }

    /// Highest object number with an entry
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }
}

/// Parse a classic `xref` section, positioned right after the keyword.
/// Stops before the `trailer` keyword.
pub(crate) fn parse_classic_section(lexer: &mut Lexer) -> LocksmithResult<XRefTable> {
    let mut table = XRefTable::new();

    loop {
        let saved = lexer.pos();
        let start = match lexer.read_unsigned() {
            Some(start) => start,
            None => {
                lexer.set_pos(saved);
                break;
            }
        };
        let count = lexer
            .read_unsigned()
            .ok_or_else(|| LocksmithError::parse("Malformed xref subsection header"))?;
        trace!("xref subsection start={} count={}", start, count);

        for i in 0..count {
            let offset = lexer
                .read_unsigned()
                .ok_or_else(|| LocksmithError::parse("Truncated xref entry"))?;
            let generation = lexer
                .read_unsigned()
                .ok_or_else(|| LocksmithError::parse("Truncated xref entry"))?;
            lexer.skip_whitespace();
            let kind = lexer.read_token();

            let number = object_number(start + i)?;
            let generation = generation.min(u16::MAX as u64) as u16;
            let entry = match kind {
                b"n" if offset == 0 => {
                    warn!("Object {} marked in use at offset 0, treating as free", number);
                    XRefEntry::Free {
                        next: 0,
                        generation,
                    }
                }
                b"n" => XRefEntry::InUse { offset, generation },
                b"f" => XRefEntry::Free {
                    next: offset as u32,
                    generation,
                },
                other => {
                    return Err(LocksmithError::parse(format!(
                        "Invalid xref entry type '{}'",
                        String::from_utf8_lossy(other)
                    )))
                }
            };
            table.insert(number, entry);
        }
    }

    debug!("Parsed classic xref section with {} entries", table.len());
    Ok(table)
}

/// Decode the entries of a cross-reference stream
pub(crate) fn parse_stream_section(stream: &Stream) -> LocksmithResult<XRefTable> {
    let dict = &stream.dict;
    let widths: Vec<usize> = dict
        .get_array("W")
        .ok_or_else(|| LocksmithError::missing_entry("W"))?
        .iter()
        .map(|w| w.as_integer().unwrap_or(0).max(0) as usize)
        .collect();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(LocksmithError::parse(format!("Invalid xref stream /W {:?}", widths)));
    }
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(LocksmithError::parse("xref stream /W has zero width"));
    }

    let size = dict.get_integer("Size").unwrap_or(0).max(0) as u64;
    let subsections: Vec<(u64, u64)> = match dict.get_array("Index") {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| match pair {
                [Object::Integer(start), Object::Integer(count)] if *start >= 0 && *count >= 0 => {
                    Some((*start as u64, *count as u64))
                }
                _ => None,
            })
            .collect(),
        None => vec![(0, size)],
    };

    let data = stream.decoded_content()?;
    let mut rows = data.chunks_exact(row_len);
    let mut table = XRefTable::new();

    'sections: for (start, count) in subsections {
        for i in 0..count {
            let Some(row) = rows.next() else {
                warn!("xref stream data ends before /Index is exhausted");
                break 'sections;
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);

            // Type defaults to 1 when its field is absent
            let kind = if widths[0] == 0 { 1 } else { read_field(f1) };
            let field2 = read_field(f2);
            let field3 = read_field(f3);

            let number = object_number(start + i)?;
            let entry = match kind {
                0 => XRefEntry::Free {
                    next: field2 as u32,
                    generation: field3.min(u16::MAX as u64) as u16,
                },
                1 => XRefEntry::InUse {
                    offset: field2,
                    generation: field3.min(u16::MAX as u64) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: field2 as u32,
                    index: field3 as u32,
                },
                other => {
                    trace!("Ignoring xref stream entry of type {}", other);
                    continue;
                }
            };
            table.insert(number, entry);
        }
    }

    debug!("Parsed xref stream with {} entries", table.len());
    Ok(table)
}

fn read_field(bytes: &[u8]) -> u64 {
    if bytes.is_empty() {
        0
    } else {
        BigEndian::read_uint(bytes, bytes.len())
    }
}
