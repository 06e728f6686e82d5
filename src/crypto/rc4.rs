//! RC4 encryption provider implementation

use cipher::consts::{U10, U11, U12, U13, U14, U15, U16, U5, U6, U7, U8, U9};
use cipher::{KeyInit, StreamCipher};
use rc4::Rc4;

use super::{CryptoProvider, Direction};
use crate::error::{LocksmithError, LocksmithResult};

/// Apply the RC4 keystream for keys of 5 to 16 bytes
macro_rules! rc4_keystream {
    ($key:expr, $data:expr, $($len:literal => $size:ty),+ $(,)?) => {
        match $key.len() {
            $(
                $len => {
                    let mut cipher = Rc4::<$size>::new_from_slice($key)
                        .map_err(|_| LocksmithError::InvalidKeyLength($key.len()))?;
                    cipher.apply_keystream($data);
                    Ok(())
                }
            )+
            other => Err(LocksmithError::InvalidKeyLength(other)),
        }
    };
}

/// RC4 over `data` in place; encryption and decryption are the same operation
pub(crate) fn rc4_transform(key: &[u8], data: &mut [u8]) -> LocksmithResult<()> {
    rc4_keystream!(
        key, data,
        5 => U5, 6 => U6, 7 => U7, 8 => U8, 9 => U9, 10 => U10,
        11 => U11, 12 => U12, 13 => U13, 14 => U14, 15 => U15, 16 => U16,
    )
}

/// RC4 encryption provider
#[derive(Debug, Default)]
pub struct RC4Provider;

impl RC4Provider {
    /// Create new RC4 provider
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for RC4Provider {
    fn process_data(&self, data: &[u8], key: &[u8], _direction: Direction) -> LocksmithResult<Vec<u8>> {
        let mut output = data.to_vec();
        rc4_transform(key, &mut output)?;
        Ok(output)
    }
}
