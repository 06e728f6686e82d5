//! PDF parsing, object model and serialization

mod dict;
mod document;
mod filter;
mod lexer;
mod object;
mod parser;
mod stream;
mod writer;
mod xref;

#[cfg(test)]
pub(crate) mod testing;

pub use dict::Dictionary;
pub use document::Document;
pub use filter::Filter;
pub use object::{IndirectObject, Object, ObjectId, StringFormat};
pub use parser::{parse, PDFParser};
pub use stream::Stream;
pub use writer::serialize;
pub use xref::{XRefEntry, XRefTable};

pub(crate) use document::is_security_dictionary;
