//! AES encryption provider implementation
//!
//! PDF strings and streams use CBC mode with a random 16-byte IV
//! prepended to the ciphertext and PKCS#7 padding.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes256};
use cbc::{Decryptor, Encryptor};
use log::warn;
use rand::{thread_rng, RngCore};

use super::{CryptoProvider, Direction};
use crate::error::{LocksmithError, LocksmithResult};

type Aes128CbcEnc = Encryptor<Aes128>;
type Aes128CbcDec = Decryptor<Aes128>;
type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

const BLOCK_SIZE: usize = 16;
const ZERO_IV: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// CBC over block-aligned data without padding
pub(crate) fn aes_cbc_no_padding(
    key: &[u8],
    iv: &[u8],
    data: &[u8],
    direction: Direction,
) -> LocksmithResult<Vec<u8>> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(LocksmithError::cipher(format!(
            "AES input of {} bytes is not block aligned",
            data.len()
        )));
    }

    let mut buffer = data.to_vec();
    let len = buffer.len();
    match (key.len(), direction) {
        (16, Direction::Encrypt) => {
            Aes128CbcEnc::new_from_slices(key, iv)?
                .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
                .map_err(|_| LocksmithError::cipher("AES block operation failed"))?;
        }
        (16, Direction::Decrypt) => {
            Aes128CbcDec::new_from_slices(key, iv)?
                .decrypt_padded_mut::<NoPadding>(&mut buffer)
                .map_err(|_| LocksmithError::cipher("AES block operation failed"))?;
        }
        (32, Direction::Encrypt) => {
            Aes256CbcEnc::new_from_slices(key, iv)?
                .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
                .map_err(|_| LocksmithError::cipher("AES block operation failed"))?;
        }
        (32, Direction::Decrypt) => {
            Aes256CbcDec::new_from_slices(key, iv)?
                .decrypt_padded_mut::<NoPadding>(&mut buffer)
                .map_err(|_| LocksmithError::cipher("AES block operation failed"))?;
        }
        (other, _) => return Err(LocksmithError::InvalidKeyLength(other)),
    }
    Ok(buffer)
}

/// AES-256 with a zero IV, used for `/UE`, `/OE` and `/Perms`
pub(crate) fn aes256_encrypt_zero_iv(key: &[u8], data: &[u8]) -> LocksmithResult<Vec<u8>> {
    aes_cbc_no_padding(key, &ZERO_IV, data, Direction::Encrypt)
}

pub(crate) fn aes256_decrypt_zero_iv(key: &[u8], data: &[u8]) -> LocksmithResult<Vec<u8>> {
    aes_cbc_no_padding(key, &ZERO_IV, data, Direction::Decrypt)
}

fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let padding = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + padding);
    padded.extend_from_slice(data);
    padded.extend(std::iter::repeat(padding as u8).take(padding));
    padded
}

/// Strip PKCS#7 padding, `None` when the padding is malformed
fn pkcs7_unpad(data: &[u8]) -> Option<&[u8]> {
    let padding = *data.last()? as usize;
    if padding == 0 || padding > BLOCK_SIZE || padding > data.len() {
        return None;
    }
    let (body, pad) = data.split_at(data.len() - padding);
    pad.iter().all(|&b| b as usize == padding).then_some(body)
}

pub(crate) struct AESProvider {
    key_length: usize,
}

impl AESProvider {
    pub fn new(key_length: usize) -> Self {
        Self { key_length }
    }

    fn encrypt(&self, data: &[u8], key: &[u8]) -> LocksmithResult<Vec<u8>> {
        let mut iv = [0u8; BLOCK_SIZE];
        thread_rng().fill_bytes(&mut iv);

        let ciphertext = aes_cbc_no_padding(key, &iv, &pkcs7_pad(data), Direction::Encrypt)?;
        let mut output = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
        output.extend_from_slice(&iv);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    fn decrypt(&self, data: &[u8], key: &[u8]) -> LocksmithResult<Vec<u8>> {
        if data.len() < BLOCK_SIZE {
            return Err(LocksmithError::cipher(format!(
                "AES payload of {} bytes is shorter than the IV",
                data.len()
            )));
        }
        let (iv, body) = data.split_at(BLOCK_SIZE);
        if body.is_empty() {
            return Ok(Vec::new());
        }

        let plaintext = aes_cbc_no_padding(key, iv, body, Direction::Decrypt)?;
        match pkcs7_unpad(&plaintext) {
            Some(unpadded) => Ok(unpadded.to_vec()),
            None => {
                warn!("Invalid PKCS#7 padding, keeping {} decrypted bytes as is", plaintext.len());
                Ok(plaintext)
            }
        }
    }
}

impl CryptoProvider for AESProvider {
    fn process_data(&self, data: &[u8], key: &[u8], direction: Direction) -> LocksmithResult<Vec<u8>> {
        if key.len() != self.key_length {
            return Err(LocksmithError::InvalidKeyLength(key.len()));
        }

        match direction {
            Direction::Encrypt => self.encrypt(data, key),
            Direction::Decrypt => self.decrypt(data, key),
        }
    }
}
