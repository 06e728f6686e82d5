//! Per-object string and stream encryption

use log::{debug, trace};

use super::key_derivation::{derive_object_key, FileKey};
use crate::crypto::{CipherKind, Direction, PDFCryptoEngine};
use crate::error::LocksmithResult;
use crate::handlers::StandardSecurityHandler;
use crate::pdf::{is_security_dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Counts of payloads a pass touched
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStats {
    pub strings: usize,
    pub streams: usize,
}

/// Applies one cipher direction to every string and stream of a document.
///
/// Left untouched: the encryption dictionary, cross-reference streams,
/// the trailer (and with it `/ID`), `/Contents` of signature
/// dictionaries, streams with their own `/Crypt` filter and, when
/// `/EncryptMetadata` is false, metadata streams.
pub(crate) struct ObjectCipher<'a> {
    engine: &'a PDFCryptoEngine,
    handler: &'a StandardSecurityHandler,
    file_key: &'a FileKey,
    direction: Direction,
}

impl<'a> ObjectCipher<'a> {
    pub fn new(
        engine: &'a PDFCryptoEngine,
        handler: &'a StandardSecurityHandler,
        file_key: &'a FileKey,
        direction: Direction,
    ) -> Self {
        Self {
            engine,
            handler,
            file_key,
            direction,
        }
    }

    pub fn process_document(&self, document: &mut Document) -> LocksmithResult<ProcessStats> {
        let encrypt = document.encrypt_reference().map(|(number, _)| number);
        let mut stats = ProcessStats::default();

        for (&number, indirect) in document.objects.iter_mut() {
            if Some(number) == encrypt {
                continue;
            }
            let id = indirect.id();
            match &mut indirect.object {
                Object::Dictionary(dict) if is_security_dictionary(dict) => {
                    trace!("Skipping security dictionary {} {}", id.0, id.1);
                }
                Object::Stream(stream) if stream.is_type("XRef") => {}
                Object::Stream(stream) => self.process_stream(stream, id, &mut stats)?,
                object => self.process_value(object, id, &mut stats)?,
            }
        }

        debug!(
            "{:?} pass over {} strings and {} streams",
            self.direction, stats.strings, stats.streams
        );
        Ok(stats)
    }

    fn process_stream(
        &self,
        stream: &mut Stream,
        id: ObjectId,
        stats: &mut ProcessStats,
    ) -> LocksmithResult<()> {
        self.process_dictionary(&mut stream.dict, id, stats)?;

        let Some(cipher) = self.handler.stream_cipher() else {
            return Ok(());
        };
        if stream.has_crypt_filter() {
            trace!("Stream {} {} has its own crypt filter", id.0, id.1);
            return Ok(());
        }
        if stream.is_type("Metadata") && !self.handler.encrypt_metadata() {
            return Ok(());
        }
        if stream.content.is_empty() && self.direction == Direction::Decrypt {
            return Ok(());
        }

        let content = self.apply(&stream.content, id, cipher)?;
        stream.set_content(content);
        stats.streams += 1;
        Ok(())
    }

    fn process_value(
        &self,
        object: &mut Object,
        id: ObjectId,
        stats: &mut ProcessStats,
    ) -> LocksmithResult<()> {
        match object {
            Object::String(bytes, _) => {
                let Some(cipher) = self.handler.string_cipher() else {
                    return Ok(());
                };
                if bytes.is_empty() && self.direction == Direction::Decrypt {
                    return Ok(());
                }
                *bytes = self.apply(bytes, id, cipher)?;
                stats.strings += 1;
            }
            Object::Array(items) => {
                for item in items.iter_mut() {
                    self.process_value(item, id, stats)?;
                }
            }
            Object::Dictionary(dict) => self.process_dictionary(dict, id, stats)?,
            _ => {}
        }
        Ok(())
    }

    fn process_dictionary(
        &self,
        dict: &mut Dictionary,
        id: ObjectId,
        stats: &mut ProcessStats,
    ) -> LocksmithResult<()> {
        let signature = dict.has_type("Sig") || dict.has_type("DocTimeStamp");
        for (key, value) in dict.iter_mut() {
            if signature && key.as_slice() == b"Contents" {
                continue;
            }
            self.process_value(value, id, stats)?;
        }
        Ok(())
    }

    fn apply(&self, payload: &[u8], (number, generation): ObjectId, cipher: CipherKind) -> LocksmithResult<Vec<u8>> {
        let key = derive_object_key(self.file_key, number, generation, cipher);
        self.engine
            .transform(payload, key.as_bytes(), self.direction, cipher)
    }
}
