//! PDF document parser implementation

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet};

use log::{debug, info, trace, warn};

use super::lexer::{is_regular, is_whitespace, Lexer};
use super::xref::{
    parse_classic_section, parse_stream_section, XRefEntry, XRefTable, MAX_OBJECT_NUMBER,
};
use super::{Dictionary, Document, IndirectObject, Object, Stream};
use crate::error::{LocksmithError, LocksmithResult};

const PDF_MAGIC: &[u8] = b"%PDF-";
const STARTXREF_MARKER: &[u8] = b"startxref";
const TRAILER_MARKER: &[u8] = b"trailer";
const ENDSTREAM_MARKER: &[u8] = b"endstream";

/// Header search window for files with leading garbage
const HEADER_SEARCH_LIMIT: usize = 1024;

/// Trailer keys inherited from older sections of an incremental update
const INHERITED_TRAILER_KEYS: [&str; 4] = ["Root", "Info", "ID", "Encrypt"];

/// Parse a complete PDF file
pub fn parse(data: &[u8]) -> LocksmithResult<Document> {
    PDFParser::new(data).parse()
}

/// PDF document parser
#[derive(Debug)]
pub struct PDFParser<'a> {
    data: &'a [u8],
    /// Offset of `%PDF-`, non-zero when the file has leading garbage
    header_offset: usize,
    xref: XRefTable,
    /// Object headers found by a full scan, newest definition wins
    scanned: OnceCell<HashMap<u32, (usize, u16)>>,
}

impl<'a> PDFParser<'a> {
    /// Create new parser over the raw file bytes
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            header_offset: 0,
            xref: XRefTable::new(),
            scanned: OnceCell::new(),
        }
    }

    /// Parse PDF document structure
    pub fn parse(mut self) -> LocksmithResult<Document> {
        trace!("Starting PDF parsing of {} bytes", self.data.len());

        let version = self.read_header();
        let (xref, trailer) = self.read_cross_references()?;
        self.xref = xref;

        let mut document = Document::new(version);
        document.trailer = trailer;

        let entries: Vec<(u32, XRefEntry)> = self.xref.iter().map(|(n, e)| (*n, *e)).collect();
        for (number, entry) in entries {
            match entry {
                XRefEntry::InUse { offset, .. } if number > 0 => {
                    if let Some(object) = self.load_object(number, offset)? {
                        document.insert_object(object);
                    }
                }
                XRefEntry::Compressed { stream, index } => {
                    document.compressed.insert(number, (stream, index));
                }
                _ => {}
            }
        }

        document.xref = std::mem::take(&mut self.xref);
        document.drop_xref_streams();

        // Object streams of encrypted files are expanded after decryption
        if !document.is_encrypted() {
            document.expand_object_streams()?;
        }

        debug!(
            "Parsed PDF {} with {} objects (encrypted: {})",
            document.version,
            document.object_count(),
            document.is_encrypted()
        );
        Ok(document)
    }

    fn read_header(&mut self) -> String {
        let window = &self.data[..self.data.len().min(HEADER_SEARCH_LIMIT)];
        let Some(offset) = find(window, PDF_MAGIC) else {
            warn!("No %PDF- header found, assuming version 1.4");
            return "1.4".to_string();
        };
        if offset > 0 {
            warn!("{} bytes of garbage before the PDF header", offset);
        }
        self.header_offset = offset;

        let version: String = self.data[offset + PDF_MAGIC.len()..]
            .iter()
            .take_while(|b| b.is_ascii_digit() || **b == b'.')
            .map(|b| *b as char)
            .collect();
        if version.is_empty() {
            "1.4".to_string()
        } else {
            version
        }
    }

    /// Read the newest cross-reference section and everything it chains to
    fn read_cross_references(&self) -> LocksmithResult<(XRefTable, Dictionary)> {
        let Some(startxref) = self.find_startxref() else {
            warn!("No startxref marker found");
            return self.reconstruct();
        };

        match self.read_xref_chain(startxref) {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("Cross-reference at offset {} unusable: {}", startxref, e);
                self.reconstruct()
            }
        }
    }

    fn find_startxref(&self) -> Option<u64> {
        let position = rfind(self.data, STARTXREF_MARKER)?;
        Lexer::at(self.data, position + STARTXREF_MARKER.len()).read_unsigned()
    }

    fn read_xref_chain(&self, start: u64) -> LocksmithResult<(XRefTable, Dictionary)> {
        let mut table = XRefTable::new();
        let mut trailer: Option<Dictionary> = None;
        let mut visited = HashSet::new();
        let mut next = Some(start);

        while let Some(offset) = next {
            if !visited.insert(offset) {
                warn!("Cross-reference /Prev loop at offset {}", offset);
                break;
            }
            let (section, section_trailer) = self.read_xref_section(offset)?;
            table.merge_older(section);

            next = section_trailer
                .get_integer("Prev")
                .filter(|prev| *prev >= 0)
                .map(|prev| prev as u64);

            match trailer.as_mut() {
                None => trailer = Some(section_trailer),
                Some(newest) => {
                    for key in INHERITED_TRAILER_KEYS {
                        if !newest.contains(key) {
                            if let Some(value) = section_trailer.get(key) {
                                newest.set(key, value.clone());
                            }
                        }
                    }
                }
            }
        }

        let trailer = trailer.ok_or_else(|| LocksmithError::parse("missing trailer"))?;
        debug!("Cross-reference chain holds {} entries", table.len());
        Ok((table, trailer))
    }

    fn read_xref_section(&self, offset: u64) -> LocksmithResult<(XRefTable, Dictionary)> {
        for position in self.candidate_positions(offset) {
            let mut lexer = Lexer::at(self.data, position);
            if lexer.eat_keyword(b"xref") {
                let mut table = parse_classic_section(&mut lexer)?;
                lexer.expect_keyword(TRAILER_MARKER)?;
                let trailer = match lexer.parse_object()? {
                    Object::Dictionary(dict) => dict,
                    other => {
                        return Err(LocksmithError::parse(format!(
                            "trailer is a {}, not a dictionary",
                            other.type_name()
                        )))
                    }
                };

                // Hybrid file: the stream lists objects hidden from older readers
                if let Some(stream_offset) = trailer.get_integer("XRefStm").filter(|o| *o >= 0) {
                    match self.read_xref_stream(stream_offset as u64) {
                        Ok((hidden, _)) => {
                            for (number, entry) in hidden.iter() {
                                let replace = matches!(
                                    table.get(*number),
                                    None | Some(XRefEntry::Free { .. })
                                );
                                if replace && !matches!(entry, XRefEntry::Free { .. }) {
                                    table.insert(*number, *entry);
                                }
                            }
                        }
                        Err(e) => warn!("Ignoring unreadable /XRefStm: {}", e),
                    }
                }
                return Ok((table, trailer));
            }
        }

        self.read_xref_stream(offset)
    }

    fn read_xref_stream(&self, offset: u64) -> LocksmithResult<(XRefTable, Dictionary)> {
        let mut last_error = None;
        for position in self.candidate_positions(offset) {
            match self.read_indirect_at(position) {
                Ok(IndirectObject {
                    object: Object::Stream(stream),
                    ..
                }) if stream.is_type("XRef") || stream.dict.contains("W") => {
                    let table = parse_stream_section(&stream)?;
                    return Ok((table, stream.dict));
                }
                Ok(other) => {
                    last_error = Some(LocksmithError::parse(format!(
                        "object {} at offset {} is not a cross-reference stream",
                        other.number, position
                    )))
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            LocksmithError::parse(format!("cross-reference offset {} out of range", offset))
        }))
    }

    /// Offsets as written, and shifted by the header offset
    fn candidate_positions(&self, offset: u64) -> Vec<usize> {
        let mut positions = Vec::with_capacity(2);
        if let Ok(offset) = usize::try_from(offset) {
            if offset < self.data.len() {
                positions.push(offset);
            }
            let shifted = offset + self.header_offset;
            if self.header_offset > 0 && shifted < self.data.len() {
                positions.push(shifted);
            }
        }
        positions
    }

    /// Rebuild the index from object headers when the cross-reference is unusable
    fn reconstruct(&self) -> LocksmithResult<(XRefTable, Dictionary)> {
        warn!("Rebuilding cross-reference index by scanning object headers");
        let scanned = self.scanned_objects();
        let mut table = XRefTable::new();
        for (&number, &(position, generation)) in scanned {
            table.insert(
                number,
                XRefEntry::InUse {
                    offset: position as u64,
                    generation,
                },
            );
        }

        if let Some(position) = rfind(self.data, TRAILER_MARKER) {
            let mut lexer = Lexer::at(self.data, position + TRAILER_MARKER.len());
            if let Ok(Object::Dictionary(trailer)) = lexer.parse_object() {
                info!("Recovered {} objects and trailer by scanning", table.len());
                return Ok((table, trailer));
            }
        }

        // No trailer keyword: use the last cross-reference stream dictionary
        let mut streams: Vec<(usize, u32)> = scanned
            .iter()
            .map(|(number, (position, _))| (*position, *number))
            .collect();
        streams.sort_unstable();
        for (position, _) in streams.into_iter().rev() {
            if let Ok(IndirectObject {
                object: Object::Stream(stream),
                ..
            }) = self.read_indirect_at(position)
            {
                if stream.is_type("XRef") {
                    if let Ok(section) = parse_stream_section(&stream) {
                        for (number, entry) in section.iter() {
                            if let XRefEntry::Compressed { .. } = entry {
                                table.insert(*number, *entry);
                            }
                        }
                    }
                    info!("Recovered {} objects by scanning", table.len());
                    return Ok((table, stream.dict));
                }
            }
        }

        Err(LocksmithError::parse("missing trailer"))
    }

    fn scanned_objects(&self) -> &HashMap<u32, (usize, u16)> {
        self.scanned.get_or_init(|| scan_object_headers(self.data))
    }

    /// Load object `number` from the offset recorded in the index
    fn load_object(&self, number: u32, offset: u64) -> LocksmithResult<Option<IndirectObject>> {
        for position in self.candidate_positions(offset) {
            if self.header_matches(position, number) {
                return self.read_indirect_at(position).map(Some);
            }
        }

        match self.scanned_objects().get(&number) {
            Some(&(position, _)) => {
                warn!(
                    "Object {} not found at offset {}, using header at {}",
                    number, offset, position
                );
                self.read_indirect_at(position).map(Some)
            }
            None => {
                warn!("Object {} could not be located, treating as null", number);
                Ok(None)
            }
        }
    }

    fn header_matches(&self, position: usize, number: u32) -> bool {
        Lexer::at(self.data, position)
            .read_object_header()
            .map_or(false, |(found, _)| found == number)
    }

    /// Parse `N G obj ... endobj` at `position`
    fn read_indirect_at(&self, position: usize) -> LocksmithResult<IndirectObject> {
        let mut lexer = Lexer::at(self.data, position);
        let (number, generation) = lexer.read_object_header()?;
        let object = match lexer.parse_object()? {
            Object::Dictionary(dict) if lexer.eat_keyword(b"stream") => {
                Object::Stream(self.read_stream_body(&mut lexer, dict)?)
            }
            other => other,
        };
        if !lexer.eat_keyword(b"endobj") {
            trace!("Object {} {} has no endobj", number, generation);
        }
        Ok(IndirectObject::new(number, generation, object))
    }

    /// Read stream data, positioned right after the `stream` keyword
    fn read_stream_body(&self, lexer: &mut Lexer, dict: Dictionary) -> LocksmithResult<Stream> {
        let mut start = lexer.pos();
        match (self.data.get(start), self.data.get(start + 1)) {
            (Some(b'\r'), Some(b'\n')) => start += 2,
            (Some(b'\n'), _) | (Some(b'\r'), _) => start += 1,
            _ => {}
        }

        let declared = self.stream_length(&dict);
        let end = match declared {
            Some(length) if self.endstream_at(start + length) => start + length,
            _ => {
                warn!(
                    "Stream at offset {} has wrong /Length {:?}, scanning for endstream",
                    start, declared
                );
                self.scan_endstream(start)?
            }
        };

        let content = self.data[start..end].to_vec();
        lexer.set_pos(end);
        lexer.expect_keyword(ENDSTREAM_MARKER)?;
        Ok(Stream::new(dict, content))
    }

    fn stream_length(&self, dict: &Dictionary) -> Option<usize> {
        match dict.get("Length")? {
            Object::Integer(length) if *length >= 0 => Some(*length as usize),
            Object::Reference((number, _)) => self.resolve_length(*number),
            _ => None,
        }
    }

    /// Resolve an indirect `/Length` through the index
    fn resolve_length(&self, number: u32) -> Option<usize> {
        let XRefEntry::InUse { offset, .. } = self.xref.get(number)? else {
            return None;
        };
        for position in self.candidate_positions(*offset) {
            let mut lexer = Lexer::at(self.data, position);
            if let Ok((found, _)) = lexer.read_object_header() {
                if found == number {
                    return lexer
                        .parse_object()
                        .ok()?
                        .as_integer()
                        .filter(|l| *l >= 0)
                        .map(|l| l as usize);
                }
            }
        }
        None
    }

    fn endstream_at(&self, position: usize) -> bool {
        position <= self.data.len() && Lexer::at(self.data, position).eat_keyword(ENDSTREAM_MARKER)
    }

    fn scan_endstream(&self, start: usize) -> LocksmithResult<usize> {
        let found = find(&self.data[start..], ENDSTREAM_MARKER)
            .ok_or_else(|| LocksmithError::parse("stream without endstream"))?;
        let mut end = start + found;
        if end > start && self.data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && self.data[end - 1] == b'\r' {
            end -= 1;
        }
        Ok(end)
    }
}

/// Find every `N G obj` header in the file
fn scan_object_headers(data: &[u8]) -> HashMap<u32, (usize, u16)> {
    let mut found = HashMap::new();
    let mut from = 0;

    while let Some(relative) = find(&data[from..], b"obj") {
        let keyword = from + relative;
        from = keyword + 3;
        if data.get(keyword + 3).map_or(false, |b| is_regular(*b)) {
            continue;
        }
        let Some(start) = header_start(data, keyword) else {
            continue;
        };
        if let Ok((number, generation)) = Lexer::at(data, start).read_object_header() {
            if number <= MAX_OBJECT_NUMBER {
                found.insert(number, (start, generation));
            }
        }
    }

    debug!("Object header scan found {} objects", found.len());
    found
}

/// Walk back from `obj` over `N G ` and return the position of `N`
fn header_start(data: &[u8], keyword: usize) -> Option<usize> {
    let mut pos = keyword;
    let skip_space = |mut p: usize| {
        while p > 0 && is_whitespace(data[p - 1]) {
            p -= 1;
        }
        p
    };
    let skip_digits = |mut p: usize| {
        while p > 0 && data[p - 1].is_ascii_digit() {
            p -= 1;
        }
        p
    };

    let after_space = skip_space(pos);
    if after_space == pos {
        return None;
    }
    pos = skip_digits(after_space);
    if pos == after_space {
        return None;
    }
    let before_generation = skip_space(pos);
    if before_generation == pos {
        return None;
    }
    let start = skip_digits(before_generation);
    if start == before_generation {
        return None;
    }
    if start > 0 && is_regular(data[start - 1]) {
        return None;
    }
    Some(start)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}
