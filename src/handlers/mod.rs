//! Security handlers for PDF encryption/decryption

mod standard;

pub use standard::StandardSecurityHandler;

use log::debug;

use crate::error::{LocksmithError, LocksmithResult};
use crate::pdf::Document;

/// Load the security handler declared by a document's trailer
pub fn security_handler(document: &Document) -> LocksmithResult<StandardSecurityHandler> {
    let dict = document
        .encryption_dictionary()
        .ok_or_else(|| LocksmithError::missing_entry("Encrypt"))?;
    let file_id = document.file_id().unwrap_or_default();
    if file_id.is_empty() {
        debug!("Encrypted document has no /ID, deriving keys with an empty identifier");
    }
    StandardSecurityHandler::from_dict(dict, &file_id)
}
