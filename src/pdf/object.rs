//! PDF object types

use super::{Dictionary, Stream};

/// Object number and generation of an indirect object
pub type ObjectId = (u32, u16);

/// How a string was written in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// `(...)` with escapes
    Literal,
    /// `<...>` hexadecimal digits
    Hexadecimal,
}

/// PDF object types
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real value
    Real(f64),
    /// String value (literal or hexadecimal)
    String(Vec<u8>, StringFormat),
    /// Name object, `#xx` escapes already decoded
    Name(Vec<u8>),
    /// Array object
    Array(Vec<Object>),
    /// Dictionary object
    Dictionary(Dictionary),
    /// Stream object
    Stream(Stream),
    /// Indirect reference
    Reference(ObjectId),
}

impl Object {
    /// Create a name object
    pub fn name(name: &str) -> Self {
        Object::Name(name.as_bytes().to_vec())
    }

    /// Create a literal string object
    pub fn string_literal(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(bytes.into(), StringFormat::Literal)
    }

    /// Create a hexadecimal string object
    pub fn string_hex(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(bytes.into(), StringFormat::Hexadecimal)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            Object::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Name as UTF-8 text, `None` for non-names or non-UTF-8 names
    pub fn as_name_str(&self) -> Option<&str> {
        self.as_name().and_then(|n| std::str::from_utf8(n).ok())
    }

    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Object::String(s, _) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionary of a dictionary or stream object
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "null",
            Object::Boolean(_) => "boolean",
            Object::Integer(_) => "integer",
            Object::Real(_) => "real",
            Object::String(..) => "string",
            Object::Name(_) => "name",
            Object::Array(_) => "array",
            Object::Dictionary(_) => "dictionary",
            Object::Stream(_) => "stream",
            Object::Reference(_) => "reference",
        }
    }

    /// Visit every indirect reference contained in this object
    pub fn for_each_reference<F: FnMut(ObjectId)>(&self, f: &mut F) {
        match self {
            Object::Reference(id) => f(*id),
            Object::Array(items) => items.iter().for_each(|item| item.for_each_reference(f)),
            Object::Dictionary(dict) => dict.values().for_each(|v| v.for_each_reference(f)),
            Object::Stream(stream) => stream.dict.values().for_each(|v| v.for_each_reference(f)),
            _ => {}
        }
    }

    /// Rewrite every indirect reference contained in this object
    pub fn map_references<F: FnMut(ObjectId) -> Object>(&mut self, f: &mut F) {
        match self {
            Object::Reference(id) => *self = f(*id),
            Object::Array(items) => items.iter_mut().for_each(|item| item.map_references(f)),
            Object::Dictionary(dict) => dict.values_mut().for_each(|v| v.map_references(f)),
            Object::Stream(stream) => stream.dict.values_mut().for_each(|v| v.map_references(f)),
            _ => {}
        }
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::Boolean(value)
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Integer(value)
    }
}

impl From<i32> for Object {
    fn from(value: i32) -> Self {
        Object::Integer(value as i64)
    }
}

impl From<u32> for Object {
    fn from(value: u32) -> Self {
        Object::Integer(value as i64)
    }
}

impl From<usize> for Object {
    fn from(value: usize) -> Self {
        Object::Integer(value as i64)
    }
}

impl From<f64> for Object {
    fn from(value: f64) -> Self {
        Object::Real(value)
    }
}

impl From<ObjectId> for Object {
    fn from(id: ObjectId) -> Self {
        Object::Reference(id)
    }
}

impl From<Dictionary> for Object {
    fn from(dict: Dictionary) -> Self {
        Object::Dictionary(dict)
    }
}

impl From<Stream> for Object {
    fn from(stream: Stream) -> Self {
        Object::Stream(stream)
    }
}

impl From<Vec<Object>> for Object {
    fn from(items: Vec<Object>) -> Self {
        Object::Array(items)
    }
}

/// Indirect object as stored in the document body
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    /// Object number
    pub number: u32,
    /// Generation number
    pub generation: u16,
    /// Object value
    pub object: Object,
}

impl IndirectObject {
    pub fn new(number: u32, generation: u16, object: Object) -> Self {
        Self {
            number,
            generation,
            object,
        }
    }

    pub fn id(&self) -> ObjectId {
        (self.number, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_accessors() {
        assert_eq!(Object::Integer(42).as_integer(), Some(42));
        assert_eq!(Object::Real(3.0).as_integer(), Some(3));
        assert_eq!(Object::Real(3.5).as_integer(), None);
        assert_eq!(Object::name("Type").as_integer(), None);
    }

    #[test]
    fn test_name_accessors() {
        let name = Object::name("Catalog");
        assert_eq!(name.as_name(), Some(&b"Catalog"[..]));
        assert_eq!(name.as_name_str(), Some("Catalog"));
        assert_eq!(Object::Name(vec![0xFF, 0xFE]).as_name_str(), None);
    }

    #[test]
    fn test_reference_walk() {
        let mut dict = Dictionary::new();
        dict.set("Kids", vec![Object::Reference((3, 0)), Object::Reference((4, 0))]);
        dict.set("Parent", Object::Reference((1, 0)));
        let obj = Object::Dictionary(dict);

        let mut seen = Vec::new();
        obj.for_each_reference(&mut |id| seen.push(id));
        seen.sort();
        assert_eq!(seen, vec![(1, 0), (3, 0), (4, 0)]);
    }

    #[test]
    fn test_reference_rewrite() {
        let mut obj = Object::Array(vec![Object::Reference((7, 0)), Object::Integer(1)]);
        obj.map_references(&mut |(num, _)| {
            if num == 7 {
                Object::Reference((2, 0))
            } else {
                Object::Null
            }
        });
        assert_eq!(
            obj,
            Object::Array(vec![Object::Reference((2, 0)), Object::Integer(1)])
        );
    }
}
