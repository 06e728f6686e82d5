//! PDF Locksmith
//!
//! Applies and removes PDF standard security handler encryption: RC4 40 and
//! 128 bit, AES-128 and AES-256. Documents are parsed into an object model,
//! every string and stream is run through the per-object cipher and the
//! result is written back with a fresh cross-reference table.
//!
//! ```no_run
//! use pdf_locksmith::PDFLocksmith;
//!
//! let locksmith = PDFLocksmith::new();
//! locksmith.protect("report.pdf", "report-locked.pdf", "s3cret")?;
//! assert!(locksmith.is_encrypted("report-locked.pdf")?);
//! locksmith.decrypt("report-locked.pdf", "report-open.pdf", "s3cret")?;
//! # Ok::<(), pdf_locksmith::LocksmithError>(())
//! ```

use std::fmt;
use std::path::Path;

use log::{debug, info, warn};

mod crypto;
mod error;
mod fs;
mod handlers;
mod pdf;
pub mod request;
mod security;

pub use crypto::{CipherKind, Direction, PDFCryptoEngine};
pub use error::{LocksmithError, LocksmithResult};
pub use handlers::StandardSecurityHandler;
pub use pdf::{
    parse, serialize, Dictionary, Document, Filter, IndirectObject, Object, ObjectId, PDFParser,
    Stream, StringFormat, XRefEntry, XRefTable,
};
pub use request::{Request, Response};
pub use security::{FileKey, ProcessStats, SecurityState, SecurityTransform};

/// Supported encryption algorithms for PDF encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncryptionAlgorithm {
    /// RC4 encryption with 40-bit key (PDF 1.3)
    Rc4_40,
    /// RC4 encryption with 128-bit key (PDF 1.4)
    Rc4_128,
    /// AES encryption with 128-bit key (PDF 1.6)
    #[default]
    Aes128,
    /// AES encryption with 256-bit key (PDF 1.7+/2.0)
    Aes256,
}

impl EncryptionAlgorithm {
    /// `/V` entry of the encryption dictionary
    pub fn version(self) -> i64 {
        match self {
            Self::Rc4_40 => 1,
            Self::Rc4_128 => 2,
            Self::Aes128 => 4,
            Self::Aes256 => 5,
        }
    }

    /// `/R` entry of the encryption dictionary
    pub fn revision(self) -> i64 {
        match self {
            Self::Rc4_40 => 2,
            Self::Rc4_128 => 3,
            Self::Aes128 => 4,
            Self::Aes256 => 6,
        }
    }

    /// File key length in bytes
    pub fn key_length(self) -> usize {
        match self {
            Self::Rc4_40 => 5,
            Self::Rc4_128 | Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    /// Lowest header version that can carry this algorithm
    pub fn min_pdf_version(self) -> &'static str {
        match self {
            Self::Rc4_40 => "1.3",
            Self::Rc4_128 => "1.4",
            Self::Aes128 => "1.6",
            Self::Aes256 => "1.7",
        }
    }

    pub fn cipher(self) -> CipherKind {
        match self {
            Self::Rc4_40 | Self::Rc4_128 => CipherKind::Rc4,
            Self::Aes128 => CipherKind::Aes128,
            Self::Aes256 => CipherKind::Aes256,
        }
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionAlgorithm::Rc4_40 => write!(f, "RC4-40"),
            EncryptionAlgorithm::Rc4_128 => write!(f, "RC4-128"),
            EncryptionAlgorithm::Aes128 => write!(f, "AES-128"),
            EncryptionAlgorithm::Aes256 => write!(f, "AES-256"),
        }
    }
}

/// PDF permissions flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PDFPermissions(u32);

impl PDFPermissions {
    /// No permissions
    pub const NONE: u32 = 0;
    /// Print the document
    pub const PRINT: u32 = 1 << 2;
    /// Modify the document
    pub const MODIFY: u32 = 1 << 3;
    /// Copy text and graphics
    pub const COPY: u32 = 1 << 4;
    /// Add or modify annotations
    pub const ANNOTATE: u32 = 1 << 5;
    /// Fill form fields
    pub const FILL_FORMS: u32 = 1 << 8;
    /// Extract text and graphics for accessibility
    pub const EXTRACT: u32 = 1 << 9;
    /// Assemble the document
    pub const ASSEMBLE: u32 = 1 << 10;
    /// Print in high quality
    pub const PRINT_HIGH: u32 = 1 << 11;
    /// All permissions
    pub const ALL: u32 = Self::PRINT
        | Self::MODIFY
        | Self::COPY
        | Self::ANNOTATE
        | Self::FILL_FORMS
        | Self::EXTRACT
        | Self::ASSEMBLE
        | Self::PRINT_HIGH;

    /// Bits that must be set in `/P` regardless of the granted permissions
    const RESERVED: u32 = 0xFFFF_F0C0;

    const NAMES: [(&'static str, u32); 8] = [
        ("print", Self::PRINT),
        ("modify", Self::MODIFY),
        ("copy", Self::COPY),
        ("annotate", Self::ANNOTATE),
        ("fillForms", Self::FILL_FORMS),
        ("extract", Self::EXTRACT),
        ("assemble", Self::ASSEMBLE),
        ("printHighQuality", Self::PRINT_HIGH),
    ];

    /// Create new permissions from raw bits
    pub fn new(bits: u32) -> Self {
        Self(bits & Self::ALL)
    }

    /// Get raw permission bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Check if specific permission is granted
    pub fn has_permission(&self, permission: u32) -> bool {
        (self.0 & permission) == permission
    }

    /// Build permissions from capability names.
    ///
    /// Matching ignores case, `_`, `-` and spaces. Unknown names are
    /// ignored; an empty list yields the default print and copy set.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bits = 0;
        let mut seen = 0usize;
        for name in names {
            seen += 1;
            match Self::flag_for_name(name.as_ref()) {
                Some(flag) => bits |= flag,
                None => warn!("Ignoring unknown permission {:?}", name.as_ref()),
            }
        }
        if seen == 0 {
            Self::default()
        } else {
            Self::new(bits)
        }
    }

    fn flag_for_name(name: &str) -> Option<u32> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "print" => Some(Self::PRINT),
            "modify" => Some(Self::MODIFY),
            "copy" => Some(Self::COPY),
            "annotate" => Some(Self::ANNOTATE),
            "fillforms" => Some(Self::FILL_FORMS),
            "extract" | "accessibility" => Some(Self::EXTRACT),
            "assemble" => Some(Self::ASSEMBLE),
            "printhighquality" | "printhigh" => Some(Self::PRINT_HIGH),
            _ => None,
        }
    }

    /// Signed `/P` value with the reserved bits set
    pub fn to_p_value(self) -> i32 {
        (self.0 | Self::RESERVED) as i32
    }

    pub fn from_p_value(p: i32) -> Self {
        Self::new(p as u32)
    }

    /// Canonical names of the granted permissions
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, flag)| self.has_permission(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl Default for PDFPermissions {
    fn default() -> Self {
        Self(Self::PRINT | Self::COPY)
    }
}

impl fmt::Display for PDFPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

/// Settings applied when protecting a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectOptions {
    pub algorithm: EncryptionAlgorithm,
    /// Used by [`PDFLocksmith::protect`]; explicit lists override it
    pub permissions: PDFPermissions,
    /// Encrypt `/Type /Metadata` streams
    pub encrypt_metadata: bool,
}

impl Default for ProtectOptions {
    fn default() -> Self {
        Self {
            algorithm: EncryptionAlgorithm::default(),
            permissions: PDFPermissions::default(),
            encrypt_metadata: true,
        }
    }
}

/// Information about PDF encryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfo {
    /// The encryption algorithm used
    pub algorithm: EncryptionAlgorithm,
    pub version: i64,
    pub revision: i64,
    /// Key length in bits
    pub key_bits: usize,
    /// Permissions granted to the user password
    pub permissions: PDFPermissions,
    pub encrypt_metadata: bool,
}

impl From<&StandardSecurityHandler> for EncryptionInfo {
    fn from(handler: &StandardSecurityHandler) -> Self {
        Self {
            algorithm: handler.algorithm(),
            version: handler.version(),
            revision: handler.revision(),
            key_bits: handler.key_length() * 8,
            permissions: handler.permissions(),
            encrypt_metadata: handler.encrypt_metadata(),
        }
    }
}

/// Main PDF encryption/decryption interface
///
/// Holds only immutable configuration; clones share the cipher engine.
#[derive(Debug, Clone, Default)]
pub struct PDFLocksmith {
    transform: SecurityTransform,
    options: ProtectOptions,
}

impl PDFLocksmith {
    /// Create a new instance with default options (AES-128, print and copy)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ProtectOptions) -> Self {
        Self {
            transform: SecurityTransform::new(PDFCryptoEngine::new()),
            options,
        }
    }

    pub fn options(&self) -> &ProtectOptions {
        &self.options
    }

    /// Protect with `password` as both user and owner password
    pub fn protect(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        password: &str,
    ) -> LocksmithResult<()> {
        self.protect_file(
            input.as_ref(),
            output.as_ref(),
            password,
            password,
            self.options.permissions,
        )
    }

    /// Protect with separate passwords and named permissions
    pub fn protect_with_permissions<S: AsRef<str>>(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        user_password: &str,
        owner_password: &str,
        permissions: &[S],
    ) -> LocksmithResult<()> {
        self.protect_file(
            input.as_ref(),
            output.as_ref(),
            user_password,
            owner_password,
            PDFPermissions::from_names(permissions),
        )
    }

    /// Remove protection, accepting either the user or the owner password
    pub fn decrypt(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        password: &str,
    ) -> LocksmithResult<()> {
        let (input, output) = (input.as_ref(), output.as_ref());
        debug!("Decrypting {} into {}", input.display(), output.display());
        let data = fs::read_input(input)?;
        fs::prepare_output(output)?;
        let decrypted = self.decrypt_bytes(&data, password)?;
        fs::write_output(output, &decrypted)?;
        info!("Wrote decrypted PDF to {}", output.display());
        Ok(())
    }

    /// Same contract as [`PDFLocksmith::decrypt`]
    pub fn remove_security(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        password: &str,
    ) -> LocksmithResult<()> {
        self.decrypt(input, output, password)
    }

    /// Whether the file declares an encryption dictionary
    pub fn is_encrypted(&self, input: impl AsRef<Path>) -> LocksmithResult<bool> {
        let data = fs::read_input(input.as_ref())?;
        self.is_encrypted_bytes(&data)
    }

    /// Encryption parameters of a file, `None` when it is not encrypted
    pub fn encryption_info(&self, input: impl AsRef<Path>) -> LocksmithResult<Option<EncryptionInfo>> {
        let data = fs::read_input(input.as_ref())?;
        self.encryption_info_bytes(&data)
    }

    pub fn protect_bytes(
        &self,
        data: &[u8],
        user_password: &str,
        owner_password: &str,
        permissions: PDFPermissions,
    ) -> LocksmithResult<Vec<u8>> {
        let mut document = load(data)?;
        let options = ProtectOptions {
            permissions,
            ..self.options
        };
        self.transform
            .protect(&mut document, user_password, owner_password, &options)?;
        serialize(&document).map_err(LocksmithError::into_encryption_failure)
    }

    pub fn decrypt_bytes(&self, data: &[u8], password: &str) -> LocksmithResult<Vec<u8>> {
        let mut document = load(data)?;
        self.transform.decrypt(&mut document, password)?;
        serialize(&document).map_err(|e| match e {
            LocksmithError::InvalidPdf(msg) => LocksmithError::DecryptionFailed(msg),
            other => other.into_decryption_failure(),
        })
    }

    pub fn is_encrypted_bytes(&self, data: &[u8]) -> LocksmithResult<bool> {
        Ok(self.transform.is_encrypted(&load(data)?))
    }

    pub fn encryption_info_bytes(&self, data: &[u8]) -> LocksmithResult<Option<EncryptionInfo>> {
        let document = load(data)?;
        if !document.is_encrypted() {
            return Ok(None);
        }
        let handler = handlers::security_handler(&document).map_err(LocksmithError::into_load_failure)?;
        Ok(Some(EncryptionInfo::from(&handler)))
    }

    fn protect_file(
        &self,
        input: &Path,
        output: &Path,
        user_password: &str,
        owner_password: &str,
        permissions: PDFPermissions,
    ) -> LocksmithResult<()> {
        debug!(
            "Protecting {} into {} with {} ({})",
            input.display(),
            output.display(),
            self.options.algorithm,
            permissions
        );
        let data = fs::read_input(input)?;
        fs::prepare_output(output)?;
        let protected = self.protect_bytes(&data, user_password, owner_password, permissions)?;
        fs::write_output(output, &protected)?;
        info!("Wrote protected PDF to {}", output.display());
        Ok(())
    }
}

fn load(data: &[u8]) -> LocksmithResult<Document> {
    parse(data).map_err(LocksmithError::into_load_failure)
}
