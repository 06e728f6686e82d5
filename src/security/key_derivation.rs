//! Standard security handler key derivation
//!
//! Revisions 2 to 4 derive the file key from an MD5 digest of the padded
//! password and the `/O`, `/P` and `/ID` entries. Revision 6 uses the
//! iterated SHA-2 hash and stores the file key wrapped in `/UE` and `/OE`.

use std::fmt;

use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{aes_cbc_no_padding, rc4_transform, CipherKind, Direction};
use crate::error::{LocksmithError, LocksmithResult};

/// Password padding string
pub(crate) const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41,
    0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80,
    0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Revision 5 and 6 passwords are cut to this many UTF-8 bytes
pub(crate) const MAX_PASSWORD_LEN: usize = 127;

/// Document-wide encryption key, wiped on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct FileKey(Vec<u8>);

impl FileKey {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileKey({} bytes)", self.0.len())
    }
}

/// Per-object key, wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct ObjectKey(Vec<u8>);

impl ObjectKey {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Values from the encryption dictionary feeding revision 2-4 key derivation
#[derive(Debug, Clone, Copy)]
pub(crate) struct KeyParams<'a> {
    pub revision: i64,
    /// Key length in bytes, 5 to 16
    pub key_length: usize,
    pub owner_value: &'a [u8],
    pub permissions: i32,
    pub file_id: &'a [u8],
    pub encrypt_metadata: bool,
}

/// Pad or truncate a password to exactly 32 bytes
pub(crate) fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

pub(crate) fn truncate_password(password: &[u8]) -> &[u8] {
    &password[..password.len().min(MAX_PASSWORD_LEN)]
}

/// Compare two byte strings without early exit
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn rc4_rounds(key: &[u8], data: &mut [u8], rounds: impl Iterator<Item = u8>) -> LocksmithResult<()> {
    let mut round_key = key.to_vec();
    for i in rounds {
        for (r, k) in round_key.iter_mut().zip(key) {
            *r = k ^ i;
        }
        rc4_transform(&round_key, data)?;
    }
    round_key.zeroize();
    Ok(())
}

/// Algorithm 2: file key from a user password
pub(crate) fn compute_file_key(password: &[u8], params: &KeyParams<'_>) -> LocksmithResult<FileKey> {
    let n = params.key_length;
    if !(5..=16).contains(&n) {
        return Err(LocksmithError::InvalidKeyLength(n));
    }

    let owner = &params.owner_value[..params.owner_value.len().min(32)];
    let mut input = Vec::with_capacity(32 + owner.len() + 4 + params.file_id.len() + 4);
    input.extend_from_slice(&pad_password(password));
    input.extend_from_slice(owner);
    input.extend_from_slice(&(params.permissions as u32).to_le_bytes());
    input.extend_from_slice(params.file_id);
    if params.revision >= 4 && !params.encrypt_metadata {
        input.extend_from_slice(&[0xFF; 4]);
    }

    let mut digest = md5::compute(&input).0;
    input.zeroize();
    if params.revision >= 3 {
        for _ in 0..50 {
            digest = md5::compute(&digest[..n]).0;
        }
    }
    let key = FileKey::new(digest[..n].to_vec());
    digest.zeroize();
    Ok(key)
}

/// Algorithm 3, steps a to d: RC4 key protecting the `/O` entry
pub(crate) fn owner_rc4_key(owner_password: &[u8], revision: i64, key_length: usize) -> Vec<u8> {
    let mut digest = md5::compute(pad_password(owner_password)).0;
    if revision >= 3 {
        for _ in 0..50 {
            digest = md5::compute(digest).0;
        }
    }
    let n = if revision == 2 { 5 } else { key_length.min(16) };
    let key = digest[..n].to_vec();
    digest.zeroize();
    key
}

/// Algorithm 3: the `/O` entry for revisions 2 to 4.
///
/// An empty owner password falls back to the user password.
pub(crate) fn compute_owner_value(
    owner_password: &[u8],
    user_password: &[u8],
    revision: i64,
    key_length: usize,
) -> LocksmithResult<Vec<u8>> {
    let owner = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let mut key = owner_rc4_key(owner, revision, key_length);

    let mut value = pad_password(user_password).to_vec();
    rc4_transform(&key, &mut value)?;
    if revision >= 3 {
        rc4_rounds(&key, &mut value, 1..=19)?;
    }
    key.zeroize();
    Ok(value)
}

/// Algorithms 4 and 5: the `/U` entry for revisions 2 to 4
pub(crate) fn compute_user_value(
    file_key: &FileKey,
    revision: i64,
    file_id: &[u8],
) -> LocksmithResult<Vec<u8>> {
    if revision == 2 {
        let mut value = PADDING.to_vec();
        rc4_transform(file_key.as_bytes(), &mut value)?;
        return Ok(value);
    }

    let mut input = PADDING.to_vec();
    input.extend_from_slice(file_id);
    let mut value = md5::compute(&input).0.to_vec();
    rc4_transform(file_key.as_bytes(), &mut value)?;
    rc4_rounds(file_key.as_bytes(), &mut value, 1..=19)?;
    value.extend_from_slice(&[0u8; 16]);
    Ok(value)
}

/// Recover the padded user password from `/O` (algorithm 7, step b)
pub(crate) fn recover_user_password(
    owner_password: &[u8],
    owner_value: &[u8],
    revision: i64,
    key_length: usize,
) -> LocksmithResult<Vec<u8>> {
    let mut key = owner_rc4_key(owner_password, revision, key_length);
    let mut value = owner_value[..owner_value.len().min(32)].to_vec();
    if revision == 2 {
        rc4_transform(&key, &mut value)?;
    } else {
        rc4_rounds(&key, &mut value, (0..=19).rev())?;
    }
    key.zeroize();
    Ok(value)
}

/// Algorithm 2.B: iterated hash for revision 6.
///
/// `user_data` is empty for user checks and `/U[0..48]` for owner checks.
pub(crate) fn hash_r6(password: &[u8], salt: &[u8], user_data: &[u8]) -> LocksmithResult<[u8; 32]> {
    let mut k: Vec<u8> = Sha256::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(user_data)
        .finalize()
        .to_vec();

    let mut round: u32 = 0;
    loop {
        let mut k1 = Vec::with_capacity(64 * (password.len() + k.len() + user_data.len()));
        for _ in 0..64 {
            k1.extend_from_slice(password);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(user_data);
        }

        let e = aes_cbc_no_padding(&k[..16], &k[16..32], &k1, Direction::Encrypt)?;
        k1.zeroize();
        let selector = e[..16].iter().map(|&b| u32::from(b)).sum::<u32>() % 3;
        k.zeroize();
        k = match selector {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        round += 1;
        let last = e.last().copied().map(u32::from).unwrap_or(0);
        if round >= 64 && last + 32 <= round {
            break;
        }
    }

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&k[..32]);
    k.zeroize();
    Ok(hash)
}

/// Revision 5 hash: a single SHA-256
pub(crate) fn hash_r5(password: &[u8], salt: &[u8], user_data: &[u8]) -> [u8; 32] {
    Sha256::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(user_data)
        .finalize()
        .into()
}

/// Revision-appropriate hash for the AES-256 handlers
pub(crate) fn hash_aes256(
    revision: i64,
    password: &[u8],
    salt: &[u8],
    user_data: &[u8],
) -> LocksmithResult<[u8; 32]> {
    match revision {
        5 => Ok(hash_r5(password, salt, user_data)),
        _ => hash_r6(password, salt, user_data),
    }
}

/// Algorithm 1: per-object key.
///
/// AES-256 uses the file key directly.
pub(crate) fn derive_object_key(
    file_key: &FileKey,
    number: u32,
    generation: u16,
    cipher: CipherKind,
) -> ObjectKey {
    if cipher == CipherKind::Aes256 {
        return ObjectKey(file_key.as_bytes().to_vec());
    }

    let mut input = Vec::with_capacity(file_key.len() + 9);
    input.extend_from_slice(file_key.as_bytes());
    input.extend_from_slice(&number.to_le_bytes()[..3]);
    input.extend_from_slice(&generation.to_le_bytes());
    if cipher.is_aes() {
        input.extend_from_slice(b"sAlT");
    }

    let mut digest = md5::compute(&input).0;
    input.zeroize();
    let n = (file_key.len() + 5).min(16);
    let key = ObjectKey(digest[..n].to_vec());
    digest.zeroize();
    key
}
