//! PDF serializer
//!
//! Always writes a complete file: header, every object in ascending
//! object number, a classic cross-reference table and a trailer. No
//! incremental updates, no cross-reference streams.

use std::io::Write;

use log::{debug, trace};

use super::{Dictionary, Document, Object, StringFormat};
use crate::error::{LocksmithError, LocksmithResult};

/// Serialize a document to bytes
pub fn serialize(document: &Document) -> LocksmithResult<Vec<u8>> {
    if !document.trailer.contains("Root") {
        return Err(LocksmithError::invalid_pdf("document has no catalog to write"));
    }

    let mut out = Vec::with_capacity(4096);
    write!(out, "%PDF-{}\n", document.version)?;
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let size = document.max_object_number() as usize + 1;
    let mut offsets: Vec<Option<(usize, u16)>> = vec![None; size];

    for object in document.objects() {
        offsets[object.number as usize] = Some((out.len(), object.generation));
        write!(out, "{} {} obj\n", object.number, object.generation)?;
        write_object(&mut out, &object.object)?;
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    write_xref(&mut out, &offsets)?;

    let mut trailer = Dictionary::new();
    trailer.set("Size", size);
    for key in ["Root", "Info", "Encrypt", "ID"] {
        if let Some(value) = document.trailer.get(key) {
            trailer.set(key, value.clone());
        }
    }
    out.extend_from_slice(b"trailer\n");
    write_dictionary(&mut out, &trailer)?;
    write!(out, "\nstartxref\n{}\n%%EOF\n", xref_offset)?;

    debug!("Serialized {} objects into {} bytes", document.object_count(), out.len());
    Ok(out)
}

/// Cross-reference table with a linked list of free entries
fn write_xref(out: &mut Vec<u8>, offsets: &[Option<(usize, u16)>]) -> LocksmithResult<()> {
    write!(out, "xref\n0 {}\n", offsets.len())?;

    let free: Vec<usize> = (1..offsets.len()).filter(|&n| offsets[n].is_none()).collect();
    trace!("Writing xref with {} free entries", free.len());

    let first_free = free.first().copied().unwrap_or(0);
    write!(out, "{:010} 65535 f \n", first_free)?;

    let mut next_free = free.iter().skip(1);
    for entry in offsets.iter().skip(1) {
        match entry {
            Some((offset, generation)) => write!(out, "{:010} {:05} n \n", offset, generation)?,
            None => write!(out, "{:010} 00001 f \n", next_free.next().copied().unwrap_or(0))?,
        }
    }
    Ok(())
}

/// Write a single object in PDF syntax
pub(crate) fn write_object(out: &mut Vec<u8>, object: &Object) -> LocksmithResult<()> {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => write!(out, "{}", i)?,
        Object::Real(r) => write_real(out, *r)?,
        Object::String(bytes, StringFormat::Hexadecimal) => {
            out.push(b'<');
            out.extend_from_slice(hex::encode_upper(bytes).as_bytes());
            out.push(b'>');
        }
        Object::String(bytes, StringFormat::Literal) => write_literal_string(out, bytes),
        Object::Name(name) => write_name(out, name),
        Object::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b' ');
                }
                write_object(out, item)?;
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict)?,
        Object::Stream(stream) => {
            let mut dict = stream.dict.clone();
            dict.set("Length", stream.content.len());
            write_dictionary(out, &dict)?;
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(&stream.content);
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference((number, generation)) => write!(out, "{} {} R", number, generation)?,
    }
    Ok(())
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) -> LocksmithResult<()> {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        write_object(out, value)?;
    }
    out.extend_from_slice(b" >>");
    Ok(())
}

fn write_name(out: &mut Vec<u8>, name: &[u8]) {
    out.push(b'/');
    for &byte in name {
        if (0x21..=0x7E).contains(&byte)
            && byte != b'#'
            && !super::lexer::is_delimiter(byte)
        {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(byte);
            }
            // Raw EOL bytes would be normalized by readers
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(byte),
        }
    }
    out.push(b')');
}

fn write_real(out: &mut Vec<u8>, value: f64) -> LocksmithResult<()> {
    if !value.is_finite() {
        out.push(b'0');
        return Ok(());
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        write!(out, "{}", value as i64)?;
        return Ok(());
    }
    let text = format!("{:.10}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    out.extend_from_slice(text.as_bytes());
    Ok(())
}
