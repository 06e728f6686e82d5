#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use cipher::consts::U16;
use cipher::{KeyInit, StreamCipher};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_locksmith::{parse, Object};
use rc4::Rc4;

pub const PAGE_CONTENT: &[u8] = b"BT /F1 18 Tf 72 700 Td (Confidential figures) Tj ET";
pub const TITLE: &[u8] = b"Board minutes";

fn stream_object(content: &[u8]) -> Vec<u8> {
    let mut body = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(b"\nendstream");
    body
}

/// Lay out objects 1..=n behind a classic cross-reference table
pub fn build_pdf(objects: &[Vec<u8>], trailer_extra: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            trailer_extra,
            xref
        )
        .as_bytes(),
    );
    out
}

/// Two pages sharing a font, plus an info dictionary
pub fn sample_pdf() -> Vec<u8> {
    let objects = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R 7 0 R] /Count 2 >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_vec(),
        stream_object(PAGE_CONTENT),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec(),
        format!("<< /Title ({}) /Author (Secretary) >>", String::from_utf8_lossy(TITLE)).into_bytes(),
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 8 0 R >>".to_vec(),
        stream_object(b"0 0 m 100 100 l S"),
    ];
    build_pdf(&objects, "/Root 1 0 R /Info 6 0 R")
}

/// Catalog with an empty page tree
pub fn pageless_pdf() -> Vec<u8> {
    let objects = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [] /Count 0 >>".to_vec(),
    ];
    build_pdf(&objects, "/Root 1 0 R")
}

/// Passwords opening [`encrypted_object_stream_pdf`]
pub const VECTOR_USER_PASSWORD: &str = "user";
pub const VECTOR_OWNER_PASSWORD: &str = "owner";

const VECTOR_ID: &str = "5d4b1a2e9c30f6774e0a83b2c1d9e5f0";
const VECTOR_OWNER: &str = "0ba3835f88f90388e74e54584125ce142be0de24c6b0d37746e075b891756671";
const VECTOR_USER: &str = "3962571bd96c67a9bdc316c492dbc1ff00000000000000000000000000000000";
const VECTOR_FILE_KEY: &str = "3c26d48ff7d45038814229809a77abeb";

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory write");
    encoder.finish().expect("in-memory deflate")
}

/// RC4 under the revision 3 object key of `number` generation 0
fn rc4_object(number: u32, data: &[u8]) -> Vec<u8> {
    let mut input = hex::decode(VECTOR_FILE_KEY).expect("file key hex");
    input.extend_from_slice(&number.to_le_bytes()[..3]);
    input.extend_from_slice(&[0, 0]);
    let key = md5::compute(&input).0;

    let mut out = data.to_vec();
    Rc4::<U16>::new_from_slice(&key)
        .expect("16 byte key")
        .apply_keystream(&mut out);
    out
}

fn raw_stream(dict_entries: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!("<< {}/Length {} >>\nstream\n", dict_entries, data.len()).into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

fn push_object(out: &mut Vec<u8>, number: usize, body: &[u8]) -> usize {
    let offset = out.len();
    out.extend_from_slice(format!("{} 0 obj\n", number).as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
    offset
}

/// PDF 1.5 file protected with RC4-128 (revision 3) whose page tree sits
/// in an encrypted object stream behind a cross-reference stream.
///
/// The `/O`, `/U` and file key are fixed values for the passwords
/// [`VECTOR_USER_PASSWORD`] and [`VECTOR_OWNER_PASSWORD`].
pub fn encrypted_object_stream_pdf() -> Vec<u8> {
    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = [0usize; 9];

    let catalog: &[u8] = b"<< /Type /Catalog /Pages 2 0 R >>";
    let pages: &[u8] = b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>";
    let page: &[u8] = b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>";
    let mut packed = format!("1 0 2 {} 3 {} ", catalog.len() + 1, catalog.len() + pages.len() + 2).into_bytes();
    let first = packed.len();
    for body in [catalog, pages, page] {
        packed.extend_from_slice(body);
        packed.push(b' ');
    }

    offsets[4] = push_object(&mut out, 4, &raw_stream("", &rc4_object(4, PAGE_CONTENT)));
    offsets[5] = push_object(
        &mut out,
        5,
        format!("<< /Title <{}> >>", hex::encode(rc4_object(5, TITLE))).as_bytes(),
    );
    offsets[6] = push_object(
        &mut out,
        6,
        &raw_stream(
            &format!("/Type /ObjStm /N 3 /First {} /Filter /FlateDecode ", first),
            &rc4_object(6, &deflate(&packed)),
        ),
    );
    offsets[7] = push_object(
        &mut out,
        7,
        format!(
            "<< /Filter /Standard /V 2 /R 3 /Length 128 /P -3904 /O <{}> /U <{}> >>",
            VECTOR_OWNER, VECTOR_USER
        )
        .as_bytes(),
    );

    let xref_offset = out.len();
    let mut rows = Vec::new();
    for number in 0..9usize {
        let (kind, field2, field3): (u8, u32, u16) = match number {
            0 => (0, 0, 0xFFFF),
            1..=3 => (2, 6, number as u16 - 1),
            8 => (1, xref_offset as u32, 0),
            n => (1, offsets[n] as u32, 0),
        };
        rows.push(kind);
        rows.extend_from_slice(&field2.to_be_bytes());
        rows.extend_from_slice(&field3.to_be_bytes());
    }
    push_object(
        &mut out,
        8,
        &raw_stream(
            &format!(
                "/Type /XRef /Size 9 /W [1 4 2] /Root 1 0 R /Info 5 0 R /Encrypt 7 0 R /ID [<{0}> <{0}>] ",
                VECTOR_ID
            ),
            &rows,
        ),
    );

    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

pub fn write_sample(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, sample_pdf()).expect("write sample pdf");
    path
}

/// Content of the first page's stream and the document title
pub fn readable_parts(data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let document = parse(data).expect("parse output");
    let catalog = document.catalog().expect("catalog");
    let pages = catalog
        .get("Pages")
        .and_then(|p| document.resolve(p).as_dict())
        .expect("pages");
    let first = pages
        .get_array("Kids")
        .and_then(|kids| kids.first())
        .and_then(|kid| document.resolve(kid).as_dict())
        .expect("first page");
    let content = first
        .get("Contents")
        .and_then(|c| document.resolve(c).as_stream())
        .map(|s| s.content.clone())
        .unwrap_or_default();

    let title = document
        .trailer
        .get("Info")
        .map(|info| document.resolve(info))
        .and_then(Object::as_dict)
        .and_then(|d| d.get_string("Title"))
        .map(<[u8]>::to_vec)
        .unwrap_or_default();
    (content, title)
}
