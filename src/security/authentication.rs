//! Password authentication against the `/O` and `/U` entries

use log::{debug, warn};

use super::key_derivation::{
    compute_file_key, compute_user_value, constant_time_eq, hash_aes256, recover_user_password,
    truncate_password, FileKey,
};
use crate::crypto::aes256_decrypt_zero_iv;
use crate::error::{LocksmithError, LocksmithResult};
use crate::handlers::StandardSecurityHandler;

impl StandardSecurityHandler {
    /// Try `password` as the user password, then as the owner password.
    ///
    /// Returns `None` when neither matches.
    pub fn authenticate(&self, password: &str) -> LocksmithResult<Option<FileKey>> {
        if let Some(key) = self.authenticate_user_password(password.as_bytes())? {
            debug!("Authenticated with the user password");
            return Ok(Some(key));
        }
        if let Some(key) = self.authenticate_owner_password(password.as_bytes())? {
            debug!("Authenticated with the owner password");
            return Ok(Some(key));
        }
        Ok(None)
    }

    /// Algorithm 6 (revisions 2 to 4) or algorithm 11 (revisions 5 and 6)
    pub fn authenticate_user_password(&self, password: &[u8]) -> LocksmithResult<Option<FileKey>> {
        match self.revision {
            2..=4 => self.verify_user_legacy(password),
            5 | 6 => self.verify_aes256(truncate_password(password), false),
            other => Err(LocksmithError::UnsupportedRevision(other)),
        }
    }

    /// Algorithm 7 (revisions 2 to 4) or algorithm 12 (revisions 5 and 6)
    pub fn authenticate_owner_password(&self, password: &[u8]) -> LocksmithResult<Option<FileKey>> {
        match self.revision {
            2..=4 => {
                let user_password =
                    recover_user_password(password, &self.owner_value, self.revision, self.key_length)?;
                self.verify_user_legacy(&user_password)
            }
            5 | 6 => self.verify_aes256(truncate_password(password), true),
            other => Err(LocksmithError::UnsupportedRevision(other)),
        }
    }

    fn verify_user_legacy(&self, password: &[u8]) -> LocksmithResult<Option<FileKey>> {
        let file_key = compute_file_key(password, &self.key_params())?;
        let computed = compute_user_value(&file_key, self.revision, &self.file_id)?;

        let compared = if self.revision == 2 { 32 } else { 16 };
        if constant_time_eq(&computed[..compared], &self.user_value[..compared]) {
            Ok(Some(file_key))
        } else {
            Ok(None)
        }
    }

    fn verify_aes256(&self, password: &[u8], as_owner: bool) -> LocksmithResult<Option<FileKey>> {
        let (value, wrapped, user_data) = if as_owner {
            (&self.owner_value, &self.owner_key, &self.user_value[..48])
        } else {
            (&self.user_value, &self.user_key, &[][..])
        };

        let hash = hash_aes256(self.revision, password, &value[32..40], user_data)?;
        if !constant_time_eq(&hash, &value[..32]) {
            return Ok(None);
        }

        if wrapped.len() < 32 {
            return Err(LocksmithError::invalid_pdf(if as_owner {
                "/OE must hold 32 bytes"
            } else {
                "/UE must hold 32 bytes"
            }));
        }
        let intermediate = hash_aes256(self.revision, password, &value[40..48], user_data)?;
        let file_key = FileKey::new(aes256_decrypt_zero_iv(&intermediate, &wrapped[..32])?);

        if self.revision >= 6 {
            self.check_perms(&file_key);
        }
        Ok(Some(file_key))
    }

    /// Compare the decrypted `/Perms` entry with `/P`; mismatches are only logged
    fn check_perms(&self, file_key: &FileKey) {
        if self.perms_value.len() < 16 {
            warn!("Missing or short /Perms entry");
            return;
        }
        let perms = match aes256_decrypt_zero_iv(file_key.as_bytes(), &self.perms_value[..16]) {
            Ok(perms) => perms,
            Err(e) => {
                warn!("Could not decrypt /Perms: {}", e);
                return;
            }
        };

        if &perms[9..12] != b"adb" {
            warn!("/Perms does not carry the expected marker");
            return;
        }
        let p = i32::from_le_bytes([perms[0], perms[1], perms[2], perms[3]]);
        if p != self.permissions {
            warn!("/Perms permissions {} differ from /P {}", p, self.permissions);
        }
        if (perms[8] == b'T') != self.encrypt_metadata {
            warn!("/Perms metadata flag differs from /EncryptMetadata");
        }
    }
}
