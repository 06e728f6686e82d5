//! PDF stream object implementation

use log::trace;

use super::filter::{decode_params, filter_names, Filter};
use super::{Dictionary, Object};
use crate::error::LocksmithResult;

/// PDF stream object
///
/// `content` always holds the raw bytes exactly as stored between
/// `stream` and `endstream`, so ciphers can run over them without
/// touching the filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// Stream dictionary
    pub dict: Dictionary,
    /// Raw stream data
    pub content: Vec<u8>,
}

impl Stream {
    /// Create new stream object, `/Length` is set from the content
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Self {
        dict.set("Length", content.len());
        Self { dict, content }
    }

    /// Replace the raw data, keeping `/Length` in sync
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.dict.set("Length", content.len());
        self.content = content;
    }

    /// Check `/Type` against a name
    pub fn is_type(&self, name: &str) -> bool {
        self.dict.has_type(name)
    }

    /// Whether the filter chain names a `/Crypt` filter
    pub fn has_crypt_filter(&self) -> bool {
        filter_names(&self.dict).iter().any(|name| name == b"Crypt")
    }

    /// Decode the stream data through its filter chain
    pub fn decoded_content(&self) -> LocksmithResult<Vec<u8>> {
        let names = filter_names(&self.dict);
        trace!("Decoding stream through {} filter(s)", names.len());

        let mut data = self.content.clone();
        for (index, name) in names.iter().enumerate() {
            let filter = Filter::from_name(name)?;
            data = filter.decode(&data, decode_params(&self.dict, index))?;
        }
        Ok(data)
    }
}

impl From<(Dictionary, Vec<u8>)> for Object {
    fn from((dict, content): (Dictionary, Vec<u8>)) -> Self {
        Object::Stream(Stream::new(dict, content))
    }
}
