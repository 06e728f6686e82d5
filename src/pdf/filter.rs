//! Stream filter decoding
//!
//! Only the decoders needed to read cross-reference streams and object
//! streams are provided. Content streams are never decoded: encryption
//! operates on the raw (still filtered) bytes.

use std::io::Read;

use flate2::read::ZlibDecoder;
use log::{trace, warn};

use crate::error::{LocksmithError, LocksmithResult};
use crate::pdf::{Dictionary, Object};

/// PDF stream filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    ASCII85Decode,
    ASCIIHexDecode,
    FlateDecode,
    RunLengthDecode,
    /// Crypt filter, handled by the security layer
    Crypt,
}

/// Predictor parameters from `/DecodeParms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PredictorParams {
    predictor: i64,
    columns: usize,
    colors: usize,
    bits_per_component: usize,
}

impl PredictorParams {
    fn from_dict(params: &Dictionary) -> Option<Self> {
        let predictor = params.get_integer("Predictor")?;
        if predictor <= 1 {
            return None;
        }
        Some(Self {
            predictor,
            columns: params.get_integer("Columns").unwrap_or(1).max(1) as usize,
            colors: params.get_integer("Colors").unwrap_or(1).max(1) as usize,
            bits_per_component: params.get_integer("BitsPerComponent").unwrap_or(8).max(1)
                as usize,
        })
    }

    fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component + 7) / 8).max(1)
    }

    fn bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component + 7) / 8
    }
}

impl Filter {
    /// Create filter from name
    pub fn from_name(name: &[u8]) -> LocksmithResult<Self> {
        match name {
            b"ASCII85Decode" | b"A85" => Ok(Filter::ASCII85Decode),
            b"ASCIIHexDecode" | b"AHx" => Ok(Filter::ASCIIHexDecode),
            b"FlateDecode" | b"Fl" => Ok(Filter::FlateDecode),
            b"RunLengthDecode" | b"RL" => Ok(Filter::RunLengthDecode),
            b"Crypt" => Ok(Filter::Crypt),
            other => Err(LocksmithError::UnsupportedFilter(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    /// Decode data using this filter
    pub fn decode(&self, data: &[u8], params: Option<&Dictionary>) -> LocksmithResult<Vec<u8>> {
        trace!("Decoding {} bytes with {:?}", data.len(), self);
        let decoded = match self {
            Filter::ASCII85Decode => decode_ascii85(data)?,
            Filter::ASCIIHexDecode => decode_ascii_hex(data)?,
            Filter::FlateDecode => decode_flate(data)?,
            Filter::RunLengthDecode => decode_run_length(data)?,
            Filter::Crypt => data.to_vec(),
        };

        match params.and_then(PredictorParams::from_dict) {
            Some(predictor) if *self == Filter::FlateDecode => apply_predictor(&decoded, &predictor),
            _ => Ok(decoded),
        }
    }
}

/// Names of the filters listed under `/Filter`, in application order
pub(crate) fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get("Filter") {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode parameters for the filter at `index`
pub(crate) fn decode_params(dict: &Dictionary, index: usize) -> Option<&Dictionary> {
    match dict.get("DecodeParms") {
        Some(Object::Dictionary(params)) if index == 0 => Some(params),
        Some(Object::Array(items)) => match items.get(index) {
            Some(Object::Dictionary(params)) => Some(params),
            _ => None,
        },
        _ => None,
    }
}

fn decode_flate(data: &[u8]) -> LocksmithResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = Vec::with_capacity(data.len() * 2);
    match decoder.read_to_end(&mut output) {
        Ok(_) => Ok(output),
        // Truncated deflate data is common; keep whatever was inflated.
        Err(e) if !output.is_empty() => {
            warn!("Flate stream ended early ({}), keeping {} bytes", e, output.len());
            Ok(output)
        }
        Err(e) => Err(LocksmithError::parse(format!("FlateDecode failed: {}", e))),
    }
}

fn decode_ascii85(data: &[u8]) -> LocksmithResult<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 4 / 5);
    let mut value: u32 = 0;
    let mut count = 0usize;

    for &byte in data {
        match byte {
            b'z' if count == 0 => output.extend_from_slice(&[0, 0, 0, 0]),
            b'~' => break,
            b'\n' | b'\r' | b'\t' | b' ' | b'\x0c' | b'\0' => continue,
            b'!'..=b'u' => {
                value = value
                    .checked_mul(85)
                    .and_then(|v| v.checked_add((byte - b'!') as u32))
                    .ok_or_else(|| LocksmithError::parse("ASCII85 group overflow"))?;
                count += 1;
                if count == 5 {
                    output.extend_from_slice(&value.to_be_bytes());
                    value = 0;
                    count = 0;
                }
            }
            other => {
                return Err(LocksmithError::parse(format!(
                    "Invalid ASCII85 character: 0x{:02X}",
                    other
                )))
            }
        }
    }

    if count > 1 {
        for _ in count..5 {
            value = value.wrapping_mul(85).wrapping_add(84);
        }
        output.extend_from_slice(&value.to_be_bytes()[..count - 1]);
    }

    Ok(output)
}

fn decode_ascii_hex(data: &[u8]) -> LocksmithResult<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &byte in data {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'A'..=b'F' => byte - b'A' + 10,
            b'a'..=b'f' => byte - b'a' + 10,
            b'>' => break,
            b'\n' | b'\r' | b'\t' | b' ' | b'\x0c' | b'\0' => continue,
            other => {
                return Err(LocksmithError::parse(format!(
                    "Invalid hex character: 0x{:02X}",
                    other
                )))
            }
        };
        match high.take() {
            Some(h) => output.push(h << 4 | digit),
            None => high = Some(digit),
        }
    }

    if let Some(h) = high {
        output.push(h << 4);
    }

    Ok(output)
}

fn decode_run_length(data: &[u8]) -> LocksmithResult<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() * 2);
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                let run = data
                    .get(i..i + count)
                    .ok_or_else(|| LocksmithError::parse("Invalid run length data"))?;
                output.extend_from_slice(run);
                i += count;
            }
            _ => {
                let byte = *data
                    .get(i)
                    .ok_or_else(|| LocksmithError::parse("Invalid run length data"))?;
                output.extend(std::iter::repeat(byte).take(257 - length as usize));
                i += 1;
            }
        }
    }

    Ok(output)
}

fn apply_predictor(data: &[u8], params: &PredictorParams) -> LocksmithResult<Vec<u8>> {
    let bpp = params.bytes_per_pixel();
    let row_len = params.bytes_per_row();
    if row_len == 0 {
        return Err(LocksmithError::parse("Invalid predictor columns"));
    }

    match params.predictor {
        2 => {
            let mut output = data.to_vec();
            if params.bits_per_component != 8 {
                warn!("TIFF predictor with {} bits per component left as is", params.bits_per_component);
                return Ok(output);
            }
            for row in output.chunks_mut(row_len) {
                for i in bpp..row.len() {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            Ok(output)
        }
        10..=15 => {
            let mut output = Vec::with_capacity(data.len());
            let mut prev_row = vec![0u8; row_len];
            let mut row = vec![0u8; row_len];

            for chunk in data.chunks(row_len + 1) {
                let filter_type = chunk[0];
                let encoded = &chunk[1..];
                row.fill(0);
                row[..encoded.len()].copy_from_slice(encoded);

                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    let up = prev_row[i];
                    let up_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    let predicted = match filter_type {
                        0 => 0,
                        1 => left,
                        2 => up,
                        3 => ((left as u16 + up as u16) / 2) as u8,
                        4 => paeth(left, up, up_left),
                        other => {
                            return Err(LocksmithError::parse(format!(
                                "Invalid PNG filter type {}",
                                other
                            )))
                        }
                    };
                    row[i] = row[i].wrapping_add(predicted);
                }

                output.extend_from_slice(&row[..encoded.len()]);
                prev_row.copy_from_slice(&row);
            }
            Ok(output)
        }
        other => Err(LocksmithError::parse(format!("Invalid predictor {}", other))),
    }
}

fn paeth(left: u8, up: u8, up_left: u8) -> u8 {
    let p = left as i16 + up as i16 - up_left as i16;
    let pa = (p - left as i16).abs();
    let pb = (p - up as i16).abs();
    let pc = (p - up_left as i16).abs();
    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}
