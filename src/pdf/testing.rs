//! Synthetic PDF files for unit tests

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

pub(crate) const PAGE_CONTENT: &[u8] = b"BT /F1 24 Tf 72 720 Td (Hello, locksmith) Tj ET";

/// Body of a stream object with a correct `/Length`
pub(crate) fn stream_object(extra: &str, content: &[u8]) -> Vec<u8> {
    let mut body = format!("<< /Length {} {}>>\nstream\n", content.len(), extra).into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(b"\nendstream");
    body
}

/// One page with a content stream, a font and an info dictionary
pub(crate) fn sample_objects() -> Vec<Vec<u8>> {
    vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_vec(),
        stream_object("", PAGE_CONTENT),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec(),
        b"<< /Title (Quarterly report) /Producer <74657374> >>".to_vec(),
    ]
}

/// Lay out objects 1..=n with a classic cross-reference table
pub(crate) fn build_pdf(version: &str, objects: &[Vec<u8>], trailer_extra: &str) -> Vec<u8> {
    let mut out = format!("%PDF-{}\n", version).into_bytes();
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

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

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory write");
    encoder.finish().expect("in-memory deflate")
}

/// PDF 1.5 file whose page tree lives in an object stream, indexed by a
/// cross-reference stream
pub(crate) fn build_compressed_pdf() -> Vec<u8> {
    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = [0usize; 7];

    offsets[1] = out.len();
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    let pages: &[u8] = b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>";
    let page: &[u8] = b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] /Contents 4 0 R >>";
    let mut packed = format!("2 0 3 {} ", pages.len() + 1).into_bytes();
    let first = packed.len();
    packed.extend_from_slice(pages);
    packed.push(b' ');
    packed.extend_from_slice(page);
    let packed = deflate(&packed);

    offsets[4] = out.len();
    out.extend_from_slice(b"4 0 obj\n");
    out.extend_from_slice(&stream_object("", b"0 0 m 200 200 l S"));
    out.extend_from_slice(b"\nendobj\n");

    offsets[5] = out.len();
    out.extend_from_slice(b"5 0 obj\n");
    out.extend_from_slice(&stream_object(
        &format!("/Type /ObjStm /N 2 /First {} /Filter /FlateDecode ", first),
        &packed,
    ));
    out.extend_from_slice(b"\nendobj\n");

    offsets[6] = out.len();
    let mut rows = Vec::new();
    for number in 0..7usize {
        let (kind, field2, field3): (u8, u32, u16) = match number {
            0 => (0, 0, 0xFFFF),
            2 => (2, 5, 0),
            3 => (2, 5, 1),
            n => (1, offsets[n] as u32, 0),
        };
        rows.push(kind);
        rows.extend_from_slice(&field2.to_be_bytes());
        rows.extend_from_slice(&field3.to_be_bytes());
    }
    out.extend_from_slice(b"6 0 obj\n");
    out.extend_from_slice(&stream_object(
        "/Type /XRef /Size 7 /W [1 4 2] /Root 1 0 R /Filter /FlateDecode ",
        &deflate(&rows),
    ));
    out.extend_from_slice(b"\nendobj\n");

    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", offsets[6]).as_bytes());
    out
}
