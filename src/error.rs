//! Error types for the PDF locksmith library

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for PDF locksmith operations
#[derive(Error, Debug)]
pub enum LocksmithError {
    /// A request field is missing or malformed
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Input file does not exist
    #[error("Input file does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Input file exists but cannot be read
    #[error("Input file is not readable: {}", .0.display())]
    FileNotReadable(PathBuf),

    /// Output directory could not be created
    #[error("Failed to create output directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Input bytes are not a loadable PDF
    #[error("Could not load PDF: {0}")]
    LoadFailed(String),

    /// Low-level syntax error while reading the file structure
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Existing protection could not be unlocked with any available password
    #[error("Input PDF is already encrypted and cannot be unlocked with provided passwords")]
    AlreadyEncrypted,

    /// Supplied password failed validation against the O/U entries
    #[error("Incorrect password for PDF")]
    WrongPassword,

    /// Document has no pages or cannot be serialized
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Cipher or serialization step failed after valid input on protect
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Cipher or serialization step failed after valid input on decrypt
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Output could not be durably written or verified
    #[error("Failed to write output: {0}")]
    WriteFailed(String),

    /// Cipher could not process the payload
    #[error("Cipher error: {0}")]
    CipherError(String),

    /// Key length not supported by the cipher
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(usize),

    /// Standard handler revision outside the supported set
    #[error("Unsupported revision: {0}")]
    UnsupportedRevision(i64),

    /// Security handler or stream filter not supported
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Missing required dictionary entry
    #[error("Missing required dictionary entry: {0}")]
    MissingDictionaryEntry(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for PDF locksmith operations
pub type LocksmithResult<T> = Result<T, LocksmithError>;

impl LocksmithError {
    /// Create a new parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a new cipher error
    pub fn cipher(msg: impl Into<String>) -> Self {
        Self::CipherError(msg.into())
    }

    /// Create a new invalid PDF error
    pub fn invalid_pdf(msg: impl Into<String>) -> Self {
        Self::InvalidPdf(msg.into())
    }

    /// Create a new invalid arguments error
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a new missing dictionary entry error
    pub fn missing_entry(key: impl Into<String>) -> Self {
        Self::MissingDictionaryEntry(key.into())
    }

    pub(crate) fn directory_creation(path: &Path, source: io::Error) -> Self {
        Self::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Stable code understood by platform adapters
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "INVALID_ARGUMENTS",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::FileNotReadable(_) => "FILE_NOT_READABLE",
            Self::DirectoryCreationFailed { .. } => "CREATE_DIRECTORY_FAILED",
            Self::LoadFailed(_)
            | Self::ParseError(_)
            | Self::UnsupportedFilter(_)
            | Self::UnsupportedRevision(_)
            | Self::MissingDictionaryEntry(_) => "LOAD_FAILED",
            Self::AlreadyEncrypted => "ALREADY_ENCRYPTED",
            Self::WrongPassword => "WRONG_PASSWORD",
            Self::InvalidPdf(_) => "INVALID_PDF",
            Self::EncryptionFailed(_) | Self::CipherError(_) | Self::InvalidKeyLength(_) => {
                "ENCRYPTION_FAILED"
            }
            Self::DecryptionFailed(_) => "DECRYPTION_FAILED",
            Self::WriteFailed(_) | Self::Io(_) => "WRITE_FAILED",
        }
    }

    /// Check if error is authentication related
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::WrongPassword | Self::AlreadyEncrypted)
    }

    /// Check if error is cryptographic
    pub fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::CipherError(_)
                | Self::InvalidKeyLength(_)
                | Self::EncryptionFailed(_)
                | Self::DecryptionFailed(_)
        )
    }

    /// Check if error is related to PDF structure
    pub fn is_structure_error(&self) -> bool {
        matches!(
            self,
            Self::ParseError(_)
                | Self::LoadFailed(_)
                | Self::InvalidPdf(_)
                | Self::MissingDictionaryEntry(_)
        )
    }

    /// Wrap structural failures raised while loading input bytes
    pub(crate) fn into_load_failure(self) -> Self {
        match self {
            Self::ParseError(msg) | Self::MissingDictionaryEntry(msg) => Self::LoadFailed(msg),
            other => other,
        }
    }

    /// Wrap cipher failures raised after the input was accepted
    pub(crate) fn into_encryption_failure(self) -> Self {
        match self {
            Self::CipherError(msg) => Self::EncryptionFailed(msg),
            Self::InvalidKeyLength(len) => {
                Self::EncryptionFailed(format!("invalid key length {}", len))
            }
            other => other,
        }
    }

    /// Wrap cipher failures raised while removing protection
    pub(crate) fn into_decryption_failure(self) -> Self {
        match self {
            Self::CipherError(msg) => Self::DecryptionFailed(msg),
            Self::InvalidKeyLength(len) => {
                Self::DecryptionFailed(format!("invalid key length {}", len))
            }
            other => other,
        }
    }
}

impl From<cipher::InvalidLength> for LocksmithError {
    fn from(err: cipher::InvalidLength) -> Self {
        Self::CipherError(err.to_string())
    }
}
