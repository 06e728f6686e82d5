//! Document-level security transforms
//!
//! A document is either unprotected, protected by a standard security
//! handler we can read, or carries an encryption dictionary we cannot
//! interpret. Protect only ever encrypts unprotected content; an
//! encrypted input is unlocked first or rejected.

mod authentication;
pub(crate) mod key_derivation;
mod object_encryption;

pub use key_derivation::FileKey;
pub use object_encryption::ProcessStats;

use log::{debug, info, warn};

use self::object_encryption::ObjectCipher;
use crate::crypto::{Direction, PDFCryptoEngine};
use crate::error::{LocksmithError, LocksmithResult};
use crate::handlers::{security_handler, StandardSecurityHandler};
use crate::pdf::Document;
use crate::{PDFPermissions, ProtectOptions};

/// Protection state of a loaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityState {
    /// No encryption dictionary
    Unprotected,
    /// Standard handler with the permissions granted to the user password
    Protected(PDFPermissions),
    /// Encryption dictionary present but not readable
    Unknown,
}

/// Applies protect and decrypt operations to parsed documents
#[derive(Debug, Clone, Default)]
pub struct SecurityTransform {
    engine: PDFCryptoEngine,
}

impl SecurityTransform {
    pub fn new(engine: PDFCryptoEngine) -> Self {
        Self { engine }
    }

    /// Classify a document without a password
    pub fn state(&self, document: &Document) -> SecurityState {
        if !document.is_encrypted() {
            return SecurityState::Unprotected;
        }
        match security_handler(document) {
            Ok(handler) => SecurityState::Protected(handler.permissions()),
            Err(e) => {
                debug!("Encryption dictionary not readable: {}", e);
                SecurityState::Unknown
            }
        }
    }

    pub fn is_encrypted(&self, document: &Document) -> bool {
        document.is_encrypted()
    }

    /// Encrypt every string and stream and install a new encryption dictionary.
    ///
    /// An already encrypted document is unlocked first with the empty
    /// password, then `user_password`, then `owner_password`.
    pub fn protect(
        &self,
        document: &mut Document,
        user_password: &str,
        owner_password: &str,
        options: &ProtectOptions,
    ) -> LocksmithResult<()> {
        // Page tree dictionaries hold no encrypted strings; a tree packed in
        // object streams is only readable after unlocking
        if document.compressed.is_empty() {
            require_pages(document)?;
        }
        if document.is_encrypted() {
            self.unlock_for_protect(document, &["", user_password, owner_password])?;
        }
        document.expand_object_streams()?;
        require_pages(document)?;

        let file_id = document.ensure_file_id();
        let (handler, file_key) =
            StandardSecurityHandler::new(options, user_password, owner_password, &file_id)?;

        let stats = ObjectCipher::new(&self.engine, &handler, &file_key, Direction::Encrypt)
            .process_document(document)
            .map_err(LocksmithError::into_encryption_failure)?;

        let encrypt = document.add_object(handler.to_dict());
        document.trailer.set("Encrypt", encrypt);
        document.require_version(options.algorithm.min_pdf_version());

        info!(
            "Protected document with {} ({} strings, {} streams)",
            options.algorithm, stats.strings, stats.streams
        );
        Ok(())
    }

    /// Remove protection using `password` as user or owner password.
    ///
    /// An unprotected document is left as is apart from object stream
    /// expansion.
    pub fn decrypt(&self, document: &mut Document, password: &str) -> LocksmithResult<()> {
        if !document.is_encrypted() {
            info!("Document is not encrypted, nothing to remove");
            return document.expand_object_streams();
        }

        let handler = security_handler(document).map_err(|e| {
            warn!("Cannot read existing protection: {}", e);
            LocksmithError::WrongPassword
        })?;
        let file_key = handler
            .authenticate(password)?
            .ok_or(LocksmithError::WrongPassword)?;
        self.strip(document, &handler, &file_key)
            .map_err(LocksmithError::into_decryption_failure)?;

        info!("Removed {} protection", handler.algorithm());
        Ok(())
    }

    /// Same contract as [`SecurityTransform::decrypt`]
    pub fn remove_security(&self, document: &mut Document, password: &str) -> LocksmithResult<()> {
        self.decrypt(document, password)
    }

    fn unlock_for_protect(&self, document: &mut Document, candidates: &[&str]) -> LocksmithResult<()> {
        let handler = security_handler(document).map_err(|e| {
            warn!("Cannot read existing protection: {}", e);
            LocksmithError::AlreadyEncrypted
        })?;

        for (attempt, password) in candidates.iter().enumerate() {
            if let Some(file_key) = handler.authenticate(password)? {
                debug!("Existing protection unlocked by candidate {}", attempt);
                return self
                    .strip(document, &handler, &file_key)
                    .map_err(LocksmithError::into_encryption_failure);
            }
        }
        Err(LocksmithError::AlreadyEncrypted)
    }

    /// Decrypt all objects and drop the encryption dictionary, rebuilding
    /// the object graph when security entries survive the in-place rewrite
    fn strip(
        &self,
        document: &mut Document,
        handler: &StandardSecurityHandler,
        file_key: &FileKey,
    ) -> LocksmithResult<()> {
        ObjectCipher::new(&self.engine, handler, file_key, Direction::Decrypt)
            .process_document(document)?;
        document.remove_encryption();
        document
            .expand_object_streams()
            .map_err(|e| LocksmithError::DecryptionFailed(e.to_string()))?;

        if document.has_residual_encryption() {
            warn!("Encryption entries survived in place, rebuilding the object graph");
            *document = document.rebuilt();
        }
        Ok(())
    }
}

fn require_pages(document: &Document) -> LocksmithResult<()> {
    if document.page_count()? == 0 {
        return Err(LocksmithError::invalid_pdf("document has no pages"));
    }
    Ok(())
}
