//! Byte-level tokenizer and direct object parser

use log::trace;

use super::{Dictionary, Object, ObjectId, StringFormat};
use crate::error::{LocksmithError, LocksmithResult};

/// Nesting limit for arrays and dictionaries
const MAX_DEPTH: usize = 256;

pub(crate) fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\0')
}

pub(crate) fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

pub(crate) fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

/// Cursor over the raw file bytes
#[derive(Debug, Clone)]
pub(crate) struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Lexer positioned at `pos`
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skip whitespace and comments
    pub fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek() {
            if is_whitespace(byte) {
                self.pos += 1;
            } else if byte == b'%' {
                while let Some(b) = self.peek() {
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Read a run of regular characters without skipping whitespace first
    pub fn read_token(&mut self) -> &'a [u8] {
        let start = self.pos;
        while self.peek().map_or(false, is_regular) {
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Skip whitespace then consume `keyword` if it is the next token
    pub fn eat_keyword(&mut self, keyword: &[u8]) -> bool {
        let saved = self.pos;
        self.skip_whitespace();
        if self.read_token() == keyword {
            true
        } else {
            self.pos = saved;
            false
        }
    }

    pub fn expect_keyword(&mut self, keyword: &[u8]) -> LocksmithResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(LocksmithError::parse(format!(
                "Expected '{}' at offset {}",
                String::from_utf8_lossy(keyword),
                self.pos
            )))
        }
    }

    /// Read an unsigned integer token
    pub fn read_unsigned(&mut self) -> Option<u64> {
        let saved = self.pos;
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().map_or(false, |b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &self.data[start..self.pos];
        let followed_by_regular = self.peek().map_or(false, is_regular);
        match std::str::from_utf8(digits).ok().and_then(|s| s.parse().ok()) {
            Some(value) if !followed_by_regular => Some(value),
            _ => {
                self.pos = saved;
                None
            }
        }
    }

    /// Parse an `N G obj` header
    pub fn read_object_header(&mut self) -> LocksmithResult<ObjectId> {
        let number = self
            .read_unsigned()
            .ok_or_else(|| LocksmithError::parse(format!("Missing object number at {}", self.pos)))?;
        let generation = self
            .read_unsigned()
            .ok_or_else(|| LocksmithError::parse(format!("Missing generation at {}", self.pos)))?;
        self.expect_keyword(b"obj")?;
        let number = u32::try_from(number)
            .map_err(|_| LocksmithError::parse(format!("Object number {} out of range", number)))?;
        Ok((number, generation.min(u16::MAX as u64) as u16))
    }

    /// Parse one direct object
    pub fn parse_object(&mut self) -> LocksmithResult<Object> {
        self.parse_object_at_depth(0)
    }

    fn parse_object_at_depth(&mut self, depth: usize) -> LocksmithResult<Object> {
        if depth > MAX_DEPTH {
            return Err(LocksmithError::parse("Objects nested too deeply"));
        }

        self.skip_whitespace();
        let byte = self
            .peek()
            .ok_or_else(|| LocksmithError::parse("Unexpected end of data"))?;

        match byte {
            b'/' => {
                self.pos += 1;
                Ok(Object::Name(self.read_name()))
            }
            b'(' => {
                self.pos += 1;
                self.read_literal_string()
            }
            b'<' if self.peek_at(1) == Some(b'<') => {
                self.pos += 2;
                self.read_dictionary(depth).map(Object::Dictionary)
            }
            b'<' => {
                self.pos += 1;
                self.read_hex_string()
            }
            b'[' => {
                self.pos += 1;
                self.read_array(depth)
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number_or_reference(),
            _ if is_regular(byte) => {
                let start = self.pos;
                match self.read_token() {
                    b"true" => Ok(Object::Boolean(true)),
                    b"false" => Ok(Object::Boolean(false)),
                    b"null" => Ok(Object::Null),
                    other => Err(LocksmithError::parse(format!(
                        "Unexpected token '{}' at offset {}",
                        String::from_utf8_lossy(other),
                        start
                    ))),
                }
            }
            other => Err(LocksmithError::parse(format!(
                "Unexpected character '{}' at offset {}",
                other as char, self.pos
            ))),
        }
    }

    fn read_name(&mut self) -> Vec<u8> {
        let raw = self.read_token();
        let mut name = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(h), Some(l)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    name.push(h << 4 | l);
                    i += 3;
                    continue;
                }
            }
            name.push(raw[i]);
            i += 1;
        }
        name
    }

    fn read_literal_string(&mut self) -> LocksmithResult<Object> {
        let mut bytes = Vec::new();
        let mut depth = 1usize;

        loop {
            let byte = self
                .bump()
                .ok_or_else(|| LocksmithError::parse("Unterminated literal string"))?;
            match byte {
                b'(' => {
                    depth += 1;
                    bytes.push(byte);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    bytes.push(byte);
                }
                b'\r' => {
                    // Unescaped end-of-line markers read as a single LF
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    bytes.push(b'\n');
                }
                b'\\' => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| LocksmithError::parse("Unterminated literal string"))?;
                    match escaped {
                        b'n' => bytes.push(b'\n'),
                        b'r' => bytes.push(b'\r'),
                        b't' => bytes.push(b'\t'),
                        b'b' => bytes.push(0x08),
                        b'f' => bytes.push(0x0c),
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = (escaped - b'0') as u32;
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + (d - b'0') as u32;
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            bytes.push((value & 0xFF) as u8);
                        }
                        other => bytes.push(other),
                    }
                }
                _ => bytes.push(byte),
            }
        }

        Ok(Object::String(bytes, StringFormat::Literal))
    }

    fn read_hex_string(&mut self) -> LocksmithResult<Object> {
        let mut bytes = Vec::new();
        let mut high: Option<u8> = None;

        loop {
            let byte = self
                .bump()
                .ok_or_else(|| LocksmithError::parse("Unterminated hex string"))?;
            if byte == b'>' {
                break;
            }
            if is_whitespace(byte) {
                continue;
            }
            let digit = hex_value(byte).ok_or_else(|| {
                LocksmithError::parse(format!(
                    "Invalid hex digit '{}' at offset {}",
                    byte as char,
                    self.pos - 1
                ))
            })?;
            match high.take() {
                Some(h) => bytes.push(h << 4 | digit),
                None => high = Some(digit),
            }
        }

        if let Some(h) = high {
            bytes.push(h << 4);
        }
        Ok(Object::String(bytes, StringFormat::Hexadecimal))
    }

    fn read_array(&mut self, depth: usize) -> LocksmithResult<Object> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Object::Array(items));
                }
                Some(_) => items.push(self.parse_object_at_depth(depth + 1)?),
                None => return Err(LocksmithError::parse("Unterminated array")),
            }
        }
    }

    pub(crate) fn read_dictionary(&mut self, depth: usize) -> LocksmithResult<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            self.skip_whitespace();
            match (self.peek(), self.peek_at(1)) {
                (Some(b'>'), Some(b'>')) => {
                    self.pos += 2;
                    return Ok(dict);
                }
                (Some(b'/'), _) => {
                    self.pos += 1;
                    let key = self.read_name();
                    self.skip_whitespace();
                    // A key directly followed by `>>` has no value
                    let value = if self.peek() == Some(b'>') && self.peek_at(1) == Some(b'>') {
                        Object::Null
                    } else {
                        self.parse_object_at_depth(depth + 1)?
                    };
                    dict.set_raw(key, value);
                }
                (None, _) => return Err(LocksmithError::parse("Unterminated dictionary")),
                _ => {
                    return Err(LocksmithError::parse(format!(
                        "Dictionary key must be a name at offset {}",
                        self.pos
                    )))
                }
            }
        }
    }

    fn read_number_or_reference(&mut self) -> LocksmithResult<Object> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'+' | b'-' | b'.' | b'0'..=b'9')) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| LocksmithError::parse("Invalid number"))?;

        if !text.contains('.') {
            if let Ok(value) = text.parse::<i64>() {
                if value >= 0 && !text.starts_with('+') {
                    if let Some(reference) = self.try_reference(value) {
                        return Ok(reference);
                    }
                }
                return Ok(Object::Integer(value));
            }
        }

        match text.parse::<f64>() {
            Ok(value) => Ok(Object::Real(value)),
            // Numbers like "-.5" parse above; "--5" and "5." variants fall back here
            Err(_) => {
                let cleaned = text.trim_end_matches('.').trim_start_matches("--");
                cleaned.parse::<f64>().map(Object::Real).map_err(|_| {
                    LocksmithError::parse(format!("Invalid number '{}' at offset {}", text, start))
                })
            }
        }
    }

    /// After reading `value`, look ahead for `G R`
    fn try_reference(&mut self, number: i64) -> Option<Object> {
        let saved = self.pos;
        let generation = self.read_unsigned();
        if let Some(generation) = generation {
            self.skip_whitespace();
            if self.peek() == Some(b'R') && self.peek_at(1).map_or(true, |b| !is_regular(b)) {
                self.pos += 1;
                if let Ok(number) = u32::try_from(number) {
                    trace!("Parsed reference {} {} R", number, generation);
                    return Some(Object::Reference((number, generation.min(u16::MAX as u64) as u16)));
                }
            }
        }
        self.pos = saved;
        None
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(input: &[u8]) -> Object {
        Lexer::new(input).parse_object().expect("object parses")
    }

    #[rstest]
    #[case(b"42", Object::Integer(42))]
    #[case(b"-17", Object::Integer(-17))]
    #[case(b"+5", Object::Integer(5))]
    #[case(b"3.25", Object::Real(3.25))]
    #[case(b"-.5", Object::Real(-0.5))]
    #[case(b"true", Object::Boolean(true))]
    #[case(b"null", Object::Null)]
    #[case(b"12 0 R", Object::Reference((12, 0)))]
    #[case(b"/Name#20With#23Hash", Object::Name(b"Name With#Hash".to_vec()))]
    fn test_simple_objects(#[case] input: &[u8], #[case] expected: Object) {
        assert_eq!(parse(input), expected);
    }

    #[test]
    fn test_literal_string_escapes() {
        let obj = parse(b"(a\\(b\\)c\\\\ \\101\\n (nested) line\\\ncontinued)");
        assert_eq!(
            obj,
            Object::String(b"a(b)c\\ A\n (nested) linecontinued".to_vec(), StringFormat::Literal)
        );
    }

    #[test]
    fn test_literal_string_eol_normalization() {
        let obj = parse(b"(one\r\ntwo\rthree)");
        assert_eq!(obj.as_string_bytes(), Some(&b"one\ntwo\nthree"[..]));
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(
            parse(b"<48 65 6C 6c 6F>"),
            Object::String(b"Hello".to_vec(), StringFormat::Hexadecimal)
        );
        assert_eq!(parse(b"<901FA>").as_string_bytes(), Some(&[0x90, 0x1F, 0xA0][..]));
    }

    #[test]
    fn test_dictionary_and_array() {
        let obj = parse(b"<< /Type /Page /Kids [1 0 R 2 0 R] /Count 2 % comment\n /Empty >>");
        let dict = obj.as_dict().expect("dictionary");
        assert!(dict.has_type("Page"));
        assert_eq!(dict.get_integer("Count"), Some(2));
        assert_eq!(
            dict.get_array("Kids"),
            Some(&vec![Object::Reference((1, 0)), Object::Reference((2, 0))])
        );
        assert_eq!(dict.get("Empty"), Some(&Object::Null));
    }

    #[test]
    fn test_integers_not_mistaken_for_reference() {
        assert_eq!(
            parse(b"[0 0 612 792]"),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792)
            ])
        );
    }

    #[test]
    fn test_object_header() -> LocksmithResult<()> {
        let mut lexer = Lexer::new(b"  7 2 obj << >> endobj");
        assert_eq!(lexer.read_object_header()?, (7, 2));
        assert!(lexer.parse_object()?.as_dict().is_some());
        assert!(lexer.eat_keyword(b"endobj"));
        Ok(())
    }

    #[test]
    fn test_truncated_input_fails() {
        assert!(Lexer::new(b"<< /Type /Page").parse_object().is_err());
        assert!(Lexer::new(b"(unterminated").parse_object().is_err());
        assert!(Lexer::new(b"[1 2").parse_object().is_err());
        assert!(Lexer::new(b"<< 1 2 >>").parse_object().is_err());
    }
}
