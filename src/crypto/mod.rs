//! PDF cryptographic engine implementation

mod aes;
mod engine;
mod rc4;

pub use engine::PDFCryptoEngine;
pub(crate) use self::aes::{aes256_decrypt_zero_iv, aes256_encrypt_zero_iv, aes_cbc_no_padding};
pub(crate) use self::rc4::rc4_transform;

use crate::error::LocksmithResult;

/// Cipher applied to strings and streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherKind {
    /// RC4 with a 40 to 128 bit object key
    Rc4,
    /// AES-128 in CBC mode, IV prepended
    Aes128,
    /// AES-256 in CBC mode, IV prepended
    Aes256,
}

impl CipherKind {
    /// Whether per-object keys take the `sAlT` suffix
    pub fn is_aes(self) -> bool {
        matches!(self, CipherKind::Aes128 | CipherKind::Aes256)
    }
}

/// Direction of a cipher pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Trait for PDF object encryption/decryption
pub(crate) trait CryptoProvider: Send + Sync {
    fn process_data(&self, data: &[u8], key: &[u8], direction: Direction) -> LocksmithResult<Vec<u8>>;
}
