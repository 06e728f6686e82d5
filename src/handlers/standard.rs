//! Standard Security Handler implementation according to PDF specification

use std::fmt;

use log::{debug, warn};
use rand::{thread_rng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{aes256_encrypt_zero_iv, CipherKind};
use crate::error::{LocksmithError, LocksmithResult};
use crate::pdf::{Dictionary, Object};
use crate::security::key_derivation::{
    compute_file_key, compute_owner_value, compute_user_value, hash_r6, truncate_password,
    FileKey, KeyParams,
};
use crate::{EncryptionAlgorithm, PDFPermissions, ProtectOptions};

/// Name of the crypt filter written for V4 and V5 dictionaries
const STD_CRYPT_FILTER: &str = "StdCF";

/// Standard security handler for password-based encryption
#[derive(Clone, ZeroizeOnDrop)]
pub struct StandardSecurityHandler {
    #[zeroize(skip)]
    pub(crate) algorithm: EncryptionAlgorithm,
    pub(crate) version: i64,
    pub(crate) revision: i64,
    /// Key length in bytes
    pub(crate) key_length: usize,
    pub(crate) permissions: i32,
    pub(crate) encrypt_metadata: bool,
    #[zeroize(skip)]
    pub(crate) string_cipher: Option<CipherKind>,
    #[zeroize(skip)]
    pub(crate) stream_cipher: Option<CipherKind>,
    pub(crate) owner_value: Vec<u8>,
    pub(crate) user_value: Vec<u8>,
    /// `/OE`, revision 5 and later
    pub(crate) owner_key: Vec<u8>,
    /// `/UE`, revision 5 and later
    pub(crate) user_key: Vec<u8>,
    pub(crate) perms_value: Vec<u8>,
    pub(crate) file_id: Vec<u8>,
}

impl fmt::Debug for StandardSecurityHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardSecurityHandler")
            .field("algorithm", &self.algorithm)
            .field("version", &self.version)
            .field("revision", &self.revision)
            .field("key_length", &self.key_length)
            .field("permissions", &self.permissions)
            .field("encrypt_metadata", &self.encrypt_metadata)
            .finish_non_exhaustive()
    }
}

impl StandardSecurityHandler {
    /// Build a handler for new protection and return it with the file key
    pub fn new(
        options: &ProtectOptions,
        user_password: &str,
        owner_password: &str,
        file_id: &[u8],
    ) -> LocksmithResult<(Self, FileKey)> {
        let algorithm = options.algorithm;
        let cipher = Some(algorithm.cipher());
        let mut handler = Self {
            algorithm,
            version: algorithm.version(),
            revision: algorithm.revision(),
            key_length: algorithm.key_length(),
            permissions: options.permissions.to_p_value(),
            encrypt_metadata: options.encrypt_metadata,
            string_cipher: cipher,
            stream_cipher: cipher,
            owner_value: Vec::new(),
            user_value: Vec::new(),
            owner_key: Vec::new(),
            user_key: Vec::new(),
            perms_value: Vec::new(),
            file_id: file_id.to_vec(),
        };

        let file_key = if handler.revision >= 5 {
            handler.generate_aes256_values(user_password.as_bytes(), owner_password.as_bytes())?
        } else {
            handler.generate_legacy_values(user_password.as_bytes(), owner_password.as_bytes())?
        };

        debug!(
            "Created {} security handler (V{} R{}, P {})",
            algorithm, handler.version, handler.revision, handler.permissions
        );
        Ok((handler, file_key))
    }

    /// Read a handler from an existing encryption dictionary
    pub fn from_dict(dict: &Dictionary, file_id: &[u8]) -> LocksmithResult<Self> {
        match dict.get_name("Filter") {
            Some("Standard") => {}
            Some(other) => return Err(LocksmithError::UnsupportedFilter(other.to_string())),
            None => return Err(LocksmithError::missing_entry("Filter")),
        }

        let version = dict.get_integer("V").unwrap_or(0);
        let revision = dict
            .get_integer("R")
            .ok_or_else(|| LocksmithError::missing_entry("R"))?;
        if !(2..=6).contains(&revision) {
            return Err(LocksmithError::UnsupportedRevision(revision));
        }

        let owner_value = required_string(dict, "O")?;
        let user_value = required_string(dict, "U")?;
        let minimum = if revision >= 5 { 48 } else { 32 };
        if owner_value.len() < minimum || user_value.len() < minimum {
            return Err(LocksmithError::invalid_pdf(format!(
                "/O and /U must hold at least {} bytes for revision {}",
                minimum, revision
            )));
        }

        let permissions = dict
            .get_integer("P")
            .ok_or_else(|| LocksmithError::missing_entry("P"))? as i32;
        let encrypt_metadata = dict.get_bool("EncryptMetadata").unwrap_or(true);

        let (string_cipher, stream_cipher) = match version {
            1..=3 => (Some(CipherKind::Rc4), Some(CipherKind::Rc4)),
            4 | 5 => (crypt_filter(dict, "StrF"), crypt_filter(dict, "StmF")),
            other => {
                return Err(LocksmithError::UnsupportedFilter(format!(
                    "Standard handler version {}",
                    other
                )))
            }
        };

        let key_length = match version {
            1 => 5,
            5 => 32,
            _ if revision >= 5 => 32,
            _ if string_cipher == Some(CipherKind::Aes128)
                || stream_cipher == Some(CipherKind::Aes128) =>
            {
                16
            }
            _ => {
                let bits = dict.get_integer("Length").unwrap_or(if version == 4 { 128 } else { 40 });
                if bits % 8 != 0 || !(40..=128).contains(&bits) {
                    return Err(LocksmithError::InvalidKeyLength(bits.max(0) as usize));
                }
                bits as usize / 8
            }
        };

        let algorithm = match (key_length, string_cipher.or(stream_cipher)) {
            (32, _) => EncryptionAlgorithm::Aes256,
            (_, Some(CipherKind::Aes128)) => EncryptionAlgorithm::Aes128,
            (5, _) => EncryptionAlgorithm::Rc4_40,
            _ => EncryptionAlgorithm::Rc4_128,
        };

        let optional = |key: &str| dict.get_string(key).map(<[u8]>::to_vec).unwrap_or_default();
        let handler = Self {
            algorithm,
            version,
            revision,
            key_length,
            permissions,
            encrypt_metadata,
            string_cipher,
            stream_cipher,
            owner_value,
            user_value,
            owner_key: optional("OE"),
            user_key: optional("UE"),
            perms_value: optional("Perms"),
            file_id: file_id.to_vec(),
        };
        debug!("Loaded security handler {:?}", handler);
        Ok(handler)
    }

    /// Encryption dictionary describing this handler
    pub fn to_dict(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("Standard"));
        dict.set("V", self.version);
        dict.set("R", self.revision);
        dict.set("Length", (self.key_length * 8) as i64);
        dict.set("P", self.permissions);
        dict.set("O", Object::string_hex(self.owner_value.clone()));
        dict.set("U", Object::string_hex(self.user_value.clone()));

        if self.version >= 4 {
            let cfm = match self.stream_cipher {
                Some(CipherKind::Aes256) => "AESV3",
                Some(CipherKind::Aes128) => "AESV2",
                _ => "V2",
            };
            let mut std_cf = Dictionary::new();
            std_cf.set("AuthEvent", Object::name("DocOpen"));
            std_cf.set("CFM", Object::name(cfm));
            std_cf.set("Length", self.key_length as i64);

            let mut filters = Dictionary::new();
            filters.set(STD_CRYPT_FILTER, std_cf);
            dict.set("CF", filters);
            dict.set("StmF", Object::name(STD_CRYPT_FILTER));
            dict.set("StrF", Object::name(STD_CRYPT_FILTER));
        }

        if self.revision >= 5 {
            dict.set("OE", Object::string_hex(self.owner_key.clone()));
            dict.set("UE", Object::string_hex(self.user_key.clone()));
            dict.set("Perms", Object::string_hex(self.perms_value.clone()));
        }
        if !self.encrypt_metadata {
            dict.set("EncryptMetadata", false);
        }
        dict
    }

    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Key length in bytes
    pub fn key_length(&self) -> usize {
        self.key_length
    }

    pub fn permissions(&self) -> PDFPermissions {
        PDFPermissions::from_p_value(self.permissions)
    }

    pub fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    /// Cipher for strings, `None` for the identity filter
    pub fn string_cipher(&self) -> Option<CipherKind> {
        self.string_cipher
    }

    /// Cipher for streams, `None` for the identity filter
    pub fn stream_cipher(&self) -> Option<CipherKind> {
        self.stream_cipher
    }

    pub(crate) fn key_params(&self) -> KeyParams<'_> {
        KeyParams {
            revision: self.revision,
            key_length: self.key_length,
            owner_value: &self.owner_value,
            permissions: self.permissions,
            file_id: &self.file_id,
            encrypt_metadata: self.encrypt_metadata,
        }
    }

    fn generate_legacy_values(
        &mut self,
        user_password: &[u8],
        owner_password: &[u8],
    ) -> LocksmithResult<FileKey> {
        self.owner_value =
            compute_owner_value(owner_password, user_password, self.revision, self.key_length)?;
        let file_key = compute_file_key(user_password, &self.key_params())?;
        self.user_value = compute_user_value(&file_key, self.revision, &self.file_id)?;
        Ok(file_key)
    }

    fn generate_aes256_values(
        &mut self,
        user_password: &[u8],
        owner_password: &[u8],
    ) -> LocksmithResult<FileKey> {
        let user_password = truncate_password(user_password);
        let owner_password = match truncate_password(owner_password) {
            [] => user_password,
            owner => owner,
        };

        let mut rng = thread_rng();
        let mut file_key = vec![0u8; 32];
        rng.fill_bytes(&mut file_key);
        let mut salts = [0u8; 32];
        rng.fill_bytes(&mut salts);
        let (user_salts, owner_salts) = salts.split_at(16);

        let mut user_value = hash_r6(user_password, &user_salts[..8], &[])?.to_vec();
        user_value.extend_from_slice(user_salts);
        let mut intermediate = hash_r6(user_password, &user_salts[8..], &[])?;
        self.user_key = aes256_encrypt_zero_iv(&intermediate, &file_key)?;
        intermediate.zeroize();

        let mut owner_value = hash_r6(owner_password, &owner_salts[..8], &user_value)?.to_vec();
        owner_value.extend_from_slice(owner_salts);
        let mut intermediate = hash_r6(owner_password, &owner_salts[8..], &user_value)?;
        self.owner_key = aes256_encrypt_zero_iv(&intermediate, &file_key)?;
        intermediate.zeroize();

        let mut perms = [0u8; 16];
        perms[..4].copy_from_slice(&self.permissions.to_le_bytes());
        perms[4..8].copy_from_slice(&[0xFF; 4]);
        perms[8] = if self.encrypt_metadata { b'T' } else { b'F' };
        perms[9..12].copy_from_slice(b"adb");
        rng.fill_bytes(&mut perms[12..]);
        self.perms_value = aes256_encrypt_zero_iv(&file_key, &perms)?;

        self.user_value = user_value;
        self.owner_value = owner_value;
        salts.zeroize();
        Ok(FileKey::new(file_key))
    }
}

fn required_string(dict: &Dictionary, key: &str) -> LocksmithResult<Vec<u8>> {
    dict.get_string(key)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| LocksmithError::missing_entry(key))
}

/// Cipher selected by a `/StmF` or `/StrF` crypt filter name
fn crypt_filter(dict: &Dictionary, key: &str) -> Option<CipherKind> {
    let name = dict.get_name(key).unwrap_or("Identity");
    if name == "Identity" {
        return None;
    }

    let Some(filter) = dict.get_dict("CF").and_then(|cf| cf.get_dict(name)) else {
        warn!("Crypt filter /{} is not defined, treating it as identity", name);
        return None;
    };
    match filter.get_name("CFM").unwrap_or("None") {
        "V2" => Some(CipherKind::Rc4),
        "AESV2" => Some(CipherKind::Aes128),
        "AESV3" => Some(CipherKind::Aes256),
        "None" => None,
        other => {
            warn!("Unknown crypt filter method /{}, treating it as identity", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const FILE_ID: [u8; 16] = [0x42; 16];

    fn options(algorithm: EncryptionAlgorithm) -> ProtectOptions {
        ProtectOptions {
            algorithm,
            ..ProtectOptions::default()
        }
    }

    #[rstest]
    #[case(EncryptionAlgorithm::Rc4_40, 1, 2, 5)]
    #[case(EncryptionAlgorithm::Rc4_128, 2, 3, 16)]
    #[case(EncryptionAlgorithm::Aes128, 4, 4, 16)]
    #[case(EncryptionAlgorithm::Aes256, 5, 6, 32)]
    fn test_new_handler_parameters(
        #[case] algorithm: EncryptionAlgorithm,
        #[case] version: i64,
        #[case] revision: i64,
        #[case] key_length: usize,
    ) -> LocksmithResult<()> {
        let (handler, key) = StandardSecurityHandler::new(&options(algorithm), "user", "owner", &FILE_ID)?;
        assert_eq!(handler.version(), version);
        assert_eq!(handler.revision(), revision);
        assert_eq!(handler.key_length(), key_length);
        assert_eq!(key.len(), key_length);

        let expected = if revision >= 5 { 48 } else { 32 };
        assert_eq!(handler.owner_value.len(), expected);
        assert_eq!(handler.user_value.len(), expected);
        Ok(())
    }

    #[rstest]
    #[case(EncryptionAlgorithm::Rc4_40)]
    #[case(EncryptionAlgorithm::Rc4_128)]
    #[case(EncryptionAlgorithm::Aes128)]
    #[case(EncryptionAlgorithm::Aes256)]
    fn test_dictionary_survives_reload(#[case] algorithm: EncryptionAlgorithm) -> LocksmithResult<()> {
        let (handler, _) = StandardSecurityHandler::new(&options(algorithm), "user", "owner", &FILE_ID)?;
        let reloaded = StandardSecurityHandler::from_dict(&handler.to_dict(), &FILE_ID)?;

        assert_eq!(reloaded.algorithm(), algorithm);
        assert_eq!(reloaded.key_length(), handler.key_length());
        assert_eq!(reloaded.string_cipher(), Some(algorithm.cipher()));
        assert_eq!(reloaded.stream_cipher(), Some(algorithm.cipher()));
        assert_eq!(reloaded.permissions, handler.permissions);
        assert_eq!(reloaded.owner_value, handler.owner_value);
        assert_eq!(reloaded.user_value, handler.user_value);
        assert_eq!(reloaded.user_key, handler.user_key);
        Ok(())
    }

    #[test_log::test]
    fn test_aes128_dictionary_layout() -> LocksmithResult<()> {
        let (handler, _) =
            StandardSecurityHandler::new(&ProtectOptions::default(), "", "owner", &FILE_ID)?;
        let dict = handler.to_dict();

        assert_eq!(dict.get_name("Filter"), Some("Standard"));
        assert_eq!(dict.get_integer("V"), Some(4));
        assert_eq!(dict.get_integer("R"), Some(4));
        assert_eq!(dict.get_integer("Length"), Some(128));
        assert_eq!(dict.get_name("StmF"), Some("StdCF"));
        assert_eq!(dict.get_name("StrF"), Some("StdCF"));
        let std_cf = dict.get_dict("CF").and_then(|cf| cf.get_dict("StdCF"));
        assert_eq!(std_cf.and_then(|d| d.get_name("CFM")), Some("AESV2"));
        assert_eq!(std_cf.and_then(|d| d.get_name("AuthEvent")), Some("DocOpen"));
        assert!(!dict.contains("EncryptMetadata"));
        Ok(())
    }

    #[test_log::test]
    fn test_aes256_dictionary_layout() -> LocksmithResult<()> {
        let opts = ProtectOptions {
            algorithm: EncryptionAlgorithm::Aes256,
            encrypt_metadata: false,
            ..ProtectOptions::default()
        };
        let (handler, _) = StandardSecurityHandler::new(&opts, "user", "owner", &FILE_ID)?;
        let dict = handler.to_dict();

        assert_eq!(dict.get_integer("V"), Some(5));
        assert_eq!(dict.get_integer("R"), Some(6));
        assert_eq!(dict.get_string("OE").map(<[u8]>::len), Some(32));
        assert_eq!(dict.get_string("UE").map(<[u8]>::len), Some(32));
        assert_eq!(dict.get_string("Perms").map(<[u8]>::len), Some(16));
        assert_eq!(dict.get_bool("EncryptMetadata"), Some(false));
        let std_cf = dict.get_dict("CF").and_then(|cf| cf.get_dict("StdCF"));
        assert_eq!(std_cf.and_then(|d| d.get_name("CFM")), Some("AESV3"));
        Ok(())
    }

    #[test_log::test]
    fn test_legacy_values_are_deterministic() -> LocksmithResult<()> {
        let opts = options(EncryptionAlgorithm::Rc4_128);
        let (first, first_key) = StandardSecurityHandler::new(&opts, "user", "owner", &FILE_ID)?;
        let (second, second_key) = StandardSecurityHandler::new(&opts, "user", "owner", &FILE_ID)?;
        assert_eq!(first.owner_value, second.owner_value);
        assert_eq!(first.user_value[..16], second.user_value[..16]);
        assert_eq!(first_key, second_key);
        Ok(())
    }

    #[test_log::test]
    fn test_from_dict_rejects_other_filters() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("Adobe.PubSec"));
        assert!(matches!(
            StandardSecurityHandler::from_dict(&dict, &FILE_ID),
            Err(LocksmithError::UnsupportedFilter(_))
        ));
    }

    #[test_log::test]
    fn test_from_dict_rejects_unknown_revision() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("Standard"));
        dict.set("V", 2);
        dict.set("R", 7);
        assert!(matches!(
            StandardSecurityHandler::from_dict(&dict, &FILE_ID),
            Err(LocksmithError::UnsupportedRevision(7))
        ));
    }

    #[test_log::test]
    fn test_from_dict_requires_validation_strings() {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::name("Standard"));
        dict.set("V", 2);
        dict.set("R", 3);
        dict.set("P", -4);
        dict.set("O", Object::string_literal(vec![0u8; 32]));
        assert!(matches!(
            StandardSecurityHandler::from_dict(&dict, &FILE_ID),
            Err(LocksmithError::MissingDictionaryEntry(ref key)) if key == "U"
        ));
    }

    #[test_log::test]
    fn test_identity_crypt_filters() -> LocksmithResult<()> {
        let (handler, _) =
            StandardSecurityHandler::new(&ProtectOptions::default(), "", "", &FILE_ID)?;
        let mut dict = handler.to_dict();
        dict.set("StrF", Object::name("Identity"));

        let reloaded = StandardSecurityHandler::from_dict(&dict, &FILE_ID)?;
        assert_eq!(reloaded.string_cipher(), None);
        assert_eq!(reloaded.stream_cipher(), Some(CipherKind::Aes128));
        Ok(())
    }

    #[test_log::test]
    fn test_unsigned_p_value_is_read_as_signed() -> LocksmithResult<()> {
        let (handler, _) = StandardSecurityHandler::new(
            &options(EncryptionAlgorithm::Rc4_40),
            "",
            "",
            &FILE_ID,
        )?;
        let mut dict = handler.to_dict();
        dict.set("P", handler.permissions as u32 as i64);

        let reloaded = StandardSecurityHandler::from_dict(&dict, &FILE_ID)?;
        assert_eq!(reloaded.permissions, handler.permissions);
        Ok(())
    }
}
