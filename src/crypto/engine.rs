//! Core cryptographic engine implementation

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;

use super::{aes, rc4, CipherKind, CryptoProvider, Direction};
use crate::error::{LocksmithError, LocksmithResult};

type ProvidersMap = HashMap<CipherKind, Box<dyn CryptoProvider>>;

/// Core engine for PDF encryption/decryption operations
///
/// Cheap to clone; the provider table is shared.
#[derive(Clone)]
pub struct PDFCryptoEngine {
    providers: Arc<ProvidersMap>,
}

impl std::fmt::Debug for PDFCryptoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PDFCryptoEngine")
            .field("ciphers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for PDFCryptoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PDFCryptoEngine {
    /// Create new cryptographic engine instance
    pub fn new() -> Self {
        let mut providers: ProvidersMap = HashMap::new();
        providers.insert(CipherKind::Rc4, Box::new(rc4::RC4Provider::new()));
        providers.insert(CipherKind::Aes128, Box::new(aes::AESProvider::new(16)));
        providers.insert(CipherKind::Aes256, Box::new(aes::AESProvider::new(32)));

        Self {
            providers: Arc::new(providers),
        }
    }

    /// Encrypt or decrypt one payload with an object key
    pub fn transform(
        &self,
        payload: &[u8],
        key: &[u8],
        direction: Direction,
        cipher: CipherKind,
    ) -> LocksmithResult<Vec<u8>> {
        trace!("{:?} {} bytes with {:?}", direction, payload.len(), cipher);
        self.get_provider(cipher)?.process_data(payload, key, direction)
    }

    pub fn encrypt(&self, payload: &[u8], key: &[u8], cipher: CipherKind) -> LocksmithResult<Vec<u8>> {
        self.transform(payload, key, Direction::Encrypt, cipher)
    }

    pub fn decrypt(&self, payload: &[u8], key: &[u8], cipher: CipherKind) -> LocksmithResult<Vec<u8>> {
        self.transform(payload, key, Direction::Decrypt, cipher)
    }

    fn get_provider(&self, cipher: CipherKind) -> LocksmithResult<&dyn CryptoProvider> {
        self.providers
            .get(&cipher)
            .map(|p| p.as_ref())
            .ok_or_else(|| LocksmithError::cipher(format!("no provider for {:?}", cipher)))
    }
}
