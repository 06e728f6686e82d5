//! In-memory PDF document

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use log::{debug, info, trace, warn};
use rand::RngCore;

use super::lexer::Lexer;
use super::xref::object_number;
use super::{Dictionary, IndirectObject, Object, ObjectId, Stream, XRefTable};
use crate::error::{LocksmithError, LocksmithResult};

/// Reference chains longer than this are treated as broken
const MAX_RESOLVE_DEPTH: usize = 32;

static NULL: Object = Object::Null;

/// Parsed PDF document
///
/// Objects are keyed by object number. A number maps to exactly one
/// object: when a file defines the same number twice, the parser keeps
/// the newest definition.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Header version, e.g. `1.7`
    pub version: String,
    /// Trailer dictionary
    pub trailer: Dictionary,
    pub(crate) objects: BTreeMap<u32, IndirectObject>,
    /// Objects still packed in object streams: number to (stream, index)
    pub(crate) compressed: BTreeMap<u32, (u32, u32)>,
    /// Cross-reference index as read from the file
    pub(crate) xref: XRefTable,
}

impl Document {
    /// Create an empty document
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    /// Number of indirect objects held in memory
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Iterate indirect objects in ascending object number
    pub fn objects(&self) -> impl Iterator<Item = &IndirectObject> {
        self.objects.values()
    }

    pub fn get_object(&self, number: u32) -> Option<&Object> {
        self.objects.get(&number).map(|o| &o.object)
    }

    pub fn get_object_mut(&mut self, number: u32) -> Option<&mut Object> {
        self.objects.get_mut(&number).map(|o| &mut o.object)
    }

    /// Follow references; missing targets resolve to null
    pub fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        let mut current = object;
        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Reference((number, _)) => match self.get_object(*number) {
                    Some(target) => current = target,
                    None => return &NULL,
                },
                other => return other,
            }
        }
        warn!("Reference chain too long, treating as null");
        &NULL
    }

    /// Insert an indirect object, replacing any object with the same number
    pub fn insert_object(&mut self, object: IndirectObject) {
        self.objects.insert(object.number, object);
    }

    /// Add a new object under the next free object number
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        let number = self.next_object_number();
        self.objects
            .insert(number, IndirectObject::new(number, 0, object.into()));
        (number, 0)
    }

    pub fn remove_object(&mut self, number: u32) -> Option<IndirectObject> {
        self.objects.remove(&number)
    }

    fn next_object_number(&self) -> u32 {
        let in_memory = self.objects.keys().next_back().copied().unwrap_or(0);
        let packed = self.compressed.keys().next_back().copied().unwrap_or(0);
        in_memory.max(packed).max(self.xref.max_object_number()) + 1
    }

    /// Highest object number in use
    pub fn max_object_number(&self) -> u32 {
        self.objects.keys().next_back().copied().unwrap_or(0)
    }

    /// Document catalog (`/Root`)
    pub fn catalog(&self) -> LocksmithResult<&Dictionary> {
        let root = self
            .trailer
            .get("Root")
            .ok_or_else(|| LocksmithError::invalid_pdf("trailer has no /Root"))?;
        self.resolve(root)
            .as_dict()
            .ok_or_else(|| LocksmithError::invalid_pdf("document catalog could not be resolved"))
    }

    /// Reference to the encryption dictionary, when stored indirectly
    pub fn encrypt_reference(&self) -> Option<ObjectId> {
        self.trailer.get_reference("Encrypt")
    }

    /// Encryption dictionary, direct or indirect
    pub fn encryption_dictionary(&self) -> Option<&Dictionary> {
        self.trailer
            .get("Encrypt")
            .and_then(|e| self.resolve(e).as_dict())
    }

    /// Whether the trailer declares an encryption dictionary
    pub fn is_encrypted(&self) -> bool {
        self.trailer.contains("Encrypt")
    }

    /// Drop the encryption dictionary and its trailer entry
    pub fn remove_encryption(&mut self) {
        if let Some((number, _)) = self.encrypt_reference() {
            self.objects.remove(&number);
        }
        self.trailer.remove("Encrypt");
    }

    /// First element of the trailer `/ID` array
    pub fn file_id(&self) -> Option<Vec<u8>> {
        let ids = self.resolve(self.trailer.get("ID")?).as_array()?;
        let first = self.resolve(ids.first()?).as_string_bytes()?;
        if first.is_empty() {
            None
        } else {
            Some(first.to_vec())
        }
    }

    /// Return the document ID, assigning a random one when absent
    pub fn ensure_file_id(&mut self) -> Vec<u8> {
        if let Some(id) = self.file_id() {
            return id;
        }
        let mut id = vec![0u8; 16];
        rand::thread_rng().fill_bytes(&mut id);
        debug!("Assigned new document ID {}", hex::encode(&id));
        self.trailer.set(
            "ID",
            vec![Object::string_hex(id.clone()), Object::string_hex(id.clone())],
        );
        id
    }

    /// Raise the header version to at least `minimum`
    pub fn require_version(&mut self, minimum: &str) {
        if parse_version(&self.version) < parse_version(minimum) {
            debug!("Raising PDF version {} to {}", self.version, minimum);
            self.version = minimum.to_string();
        }
    }

    /// Count leaf pages reachable from the catalog's page tree
    pub fn page_count(&self) -> LocksmithResult<usize> {
        let catalog = self.catalog()?;
        let Some(pages) = catalog.get("Pages") else {
            return Ok(0);
        };
        let mut visited = HashSet::new();
        Ok(self.count_pages(pages, &mut visited))
    }

    fn count_pages(&self, node: &Object, visited: &mut HashSet<u32>) -> usize {
        if let Object::Reference((number, _)) = node {
            if !visited.insert(*number) {
                warn!("Page tree cycle at object {}", number);
                return 0;
            }
        }
        let Some(dict) = self.resolve(node).as_dict() else {
            return 0;
        };

        match (dict.get_name("Type"), dict.get("Kids")) {
            (Some("Page"), _) => 1,
            (_, Some(kids)) => match self.resolve(kids).as_array() {
                Some(kids) => kids.iter().map(|kid| self.count_pages(kid, visited)).sum(),
                None => 0,
            },
            (Some("Pages"), None) => 0,
            _ if dict.contains("Contents") || dict.contains("MediaBox") => 1,
            _ => 0,
        }
    }

    /// Remove cross-reference streams; the writer emits a fresh table
    pub(crate) fn drop_xref_streams(&mut self) {
        let before = self.objects.len();
        self.objects.retain(|_, o| {
            !matches!(&o.object, Object::Stream(s) if s.is_type("XRef"))
        });
        if before != self.objects.len() {
            trace!("Dropped {} cross-reference stream(s)", before - self.objects.len());
        }
    }

    /// Unpack objects stored in object streams into the document body.
    ///
    /// Must run on decrypted data: object streams are encrypted as a whole.
    pub fn expand_object_streams(&mut self) -> LocksmithResult<()> {
        let compressed = std::mem::take(&mut self.compressed);
        let mut by_stream: BTreeMap<u32, HashSet<u32>> = BTreeMap::new();
        for (number, (stream, _)) in &compressed {
            by_stream.entry(*stream).or_default().insert(*number);
        }

        let mut expanded = 0usize;
        for (stream_number, members) in by_stream {
            let Some(stream) = self.get_object(stream_number).and_then(Object::as_stream) else {
                warn!("Object stream {} is missing", stream_number);
                continue;
            };
            for (number, object) in parse_object_stream(stream)? {
                if members.contains(&number) && !self.objects.contains_key(&number) {
                    self.objects
                        .insert(number, IndirectObject::new(number, 0, object));
                    expanded += 1;
                }
            }
        }

        self.objects.retain(|_, o| {
            !matches!(&o.object, Object::Stream(s) if s.is_type("ObjStm"))
        });
        if expanded > 0 {
            info!("Expanded {} object(s) from object streams", expanded);
        }
        Ok(())
    }

    /// Whether any trace of a standard security handler survives
    pub fn has_residual_encryption(&self) -> bool {
        self.trailer.contains("Encrypt")
            || self
                .objects
                .values()
                .filter_map(|o| o.object.as_dict())
                .any(is_security_dictionary)
    }

    /// Rebuild the object graph from the catalog and info dictionary.
    ///
    /// Only objects reachable from `/Root` and `/Info` survive; they are
    /// renumbered from 1 with generation 0. The document ID is kept.
    pub fn rebuilt(&self) -> Document {
        let encrypt = self.encrypt_reference().map(|(n, _)| n);
        let mut mapping: HashMap<u32, u32> = HashMap::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<u32> = ["Root", "Info"]
            .iter()
            .filter_map(|key| self.trailer.get_reference(key))
            .map(|(n, _)| n)
            .collect();

        while let Some(number) = queue.pop_front() {
            if mapping.contains_key(&number) || Some(number) == encrypt {
                continue;
            }
            let Some(object) = self.objects.get(&number) else {
                continue;
            };
            if object.object.as_dict().map_or(false, is_security_dictionary) {
                continue;
            }
            mapping.insert(number, order.len() as u32 + 1);
            order.push(number);
            object.object.for_each_reference(&mut |(n, _)| queue.push_back(n));
        }

        let mut rebuilt = Document::new(self.version.clone());
        let mut remap = |(number, _): ObjectId| match mapping.get(&number) {
            Some(&new) => Object::Reference((new, 0)),
            None => Object::Null,
        };
        for old in order {
            if let Some(source) = self.objects.get(&old) {
                let mut object = source.object.clone();
                object.map_references(&mut remap);
                let new = mapping.get(&old).copied().unwrap_or(0);
                rebuilt.objects.insert(new, IndirectObject::new(new, 0, object));
            }
        }

        for key in ["Root", "Info"] {
            if let Some(Object::Reference(id)) = self.trailer.get(key) {
                if let Object::Reference(new) = remap(*id) {
                    rebuilt.trailer.set(key, new);
                }
            }
        }
        if let Some(id) = self.trailer.get("ID") {
            rebuilt.trailer.set("ID", self.resolve(id).clone());
        }

        info!(
            "Rebuilt document with {} of {} objects",
            rebuilt.objects.len(),
            self.objects.len()
        );
        rebuilt
    }
}

/// `/Filter /Standard` dictionaries carrying both `/O` and `/U`
pub(crate) fn is_security_dictionary(dict: &Dictionary) -> bool {
    dict.get_name("Filter") == Some("Standard") && dict.contains("O") && dict.contains("U")
}

/// Parse every object packed in an object stream
pub(crate) fn parse_object_stream(stream: &Stream) -> LocksmithResult<Vec<(u32, Object)>> {
    let count = stream
        .dict
        .get_integer("N")
        .ok_or_else(|| LocksmithError::missing_entry("N"))?
        .max(0) as usize;
    let first = stream
        .dict
        .get_integer("First")
        .ok_or_else(|| LocksmithError::missing_entry("First"))?
        .max(0) as usize;
    let data = stream.decoded_content()?;

    let mut header = Lexer::new(&data);
    let mut entries = Vec::with_capacity(count.min(data.len() / 4));
    for _ in 0..count {
        let number = header.read_unsigned();
        let offset = header.read_unsigned();
        match (number, offset) {
            (Some(number), Some(offset)) => entries.push((object_number(number)?, offset as usize)),
            _ => return Err(LocksmithError::parse("Malformed object stream header")),
        }
    }

    let mut objects = Vec::with_capacity(entries.len());
    for (number, offset) in entries {
        let position = first + offset;
        if position >= data.len() {
            return Err(LocksmithError::parse(format!(
                "Object {} lies outside its object stream",
                number
            )));
        }
        let object = Lexer::at(&data, position).parse_object()?;
        objects.push((number, object));
    }
    Ok(objects)
}

fn parse_version(version: &str) -> (u32, u32) {
    let mut parts = version.trim().splitn(2, '.');
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(1);
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (major, minor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page_tree(kids: Vec<Object>) -> Document {
        let mut doc = Document::new("1.4");
        let mut pages = Dictionary::new();
        pages.set("Type", Object::name("Pages"));
        pages.set("Kids", kids);
        doc.insert_object(IndirectObject::new(2, 0, pages.into()));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name("Catalog"));
        catalog.set("Pages", Object::Reference((2, 0)));
        doc.insert_object(IndirectObject::new(1, 0, catalog.into()));
        doc.trailer.set("Root", Object::Reference((1, 0)));
        doc
    }

    fn page() -> Object {
        let mut page = Dictionary::new();
        page.set("Type", Object::name("Page"));
        page.set("Parent", Object::Reference((2, 0)));
        page.into()
    }

    #[test_log::test]
    fn test_page_count() -> LocksmithResult<()> {
        let mut doc = page_tree(vec![Object::Reference((3, 0)), Object::Reference((4, 0))]);
        doc.insert_object(IndirectObject::new(3, 0, page()));
        doc.insert_object(IndirectObject::new(4, 0, page()));
        assert_eq!(doc.page_count()?, 2);
        Ok(())
    }

    #[test_log::test]
    fn test_page_count_empty_tree() -> LocksmithResult<()> {
        let doc = page_tree(Vec::new());
        assert_eq!(doc.page_count()?, 0);
        Ok(())
    }

    #[test_log::test]
    fn test_page_count_survives_cycles() -> LocksmithResult<()> {
        // Kids points back at the page tree root
        let mut doc = page_tree(vec![Object::Reference((2, 0)), Object::Reference((3, 0))]);
        doc.insert_object(IndirectObject::new(3, 0, page()));
        assert_eq!(doc.page_count()?, 1);
        Ok(())
    }

    #[test_log::test]
    fn test_missing_root_is_invalid() {
        let doc = Document::new("1.4");
        assert!(matches!(doc.page_count(), Err(LocksmithError::InvalidPdf(_))));
    }

    #[test_log::test]
    fn test_resolve_missing_reference_is_null() {
        let doc = Document::new("1.4");
        assert_eq!(doc.resolve(&Object::Reference((99, 0))), &Object::Null);
    }

    #[test_log::test]
    fn test_ensure_file_id_keeps_existing() {
        let mut doc = Document::new("1.4");
        doc.trailer.set(
            "ID",
            vec![Object::string_hex(vec![1, 2, 3]), Object::string_hex(vec![4, 5, 6])],
        );
        assert_eq!(doc.ensure_file_id(), vec![1, 2, 3]);

        let mut fresh = Document::new("1.4");
        let id = fresh.ensure_file_id();
        assert_eq!(id.len(), 16);
        assert_eq!(fresh.file_id(), Some(id));
    }

    #[test_log::test]
    fn test_require_version() {
        let mut doc = Document::new("1.3");
        doc.require_version("1.6");
        assert_eq!(doc.version, "1.6");
        doc.require_version("1.4");
        assert_eq!(doc.version, "1.6");
        doc.require_version("2.0");
        assert_eq!(doc.version, "2.0");
    }

    #[test_log::test]
    fn test_add_object_uses_next_number() {
        let mut doc = page_tree(Vec::new());
        let id = doc.add_object(Object::Integer(5));
        assert_eq!(id, (3, 0));
        assert_eq!(doc.get_object(3), Some(&Object::Integer(5)));
    }

    #[test_log::test]
    fn test_rebuilt_drops_unreachable_objects() -> LocksmithResult<()> {
        let mut doc = page_tree(vec![Object::Reference((7, 0))]);
        doc.insert_object(IndirectObject::new(7, 0, page()));
        doc.insert_object(IndirectObject::new(9, 0, Object::string_literal("orphan")));

        let mut security = Dictionary::new();
        security.set("Filter", Object::name("Standard"));
        security.set("O", Object::string_hex(vec![0; 32]));
        security.set("U", Object::string_hex(vec![0; 32]));
        doc.insert_object(IndirectObject::new(12, 0, security.into()));
        assert!(doc.has_residual_encryption());

        let rebuilt = doc.rebuilt();
        assert_eq!(rebuilt.object_count(), 3);
        assert_eq!(rebuilt.trailer.get_reference("Root"), Some((1, 0)));
        assert_eq!(rebuilt.page_count()?, 1);
        assert!(!rebuilt.has_residual_encryption());
        Ok(())
    }

    #[test_log::test]
    fn test_expand_object_streams() -> LocksmithResult<()> {
        let body = b"4 0 5 11 << /A 1 >> (packed)";
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("ObjStm"));
        dict.set("N", 2i64);
        dict.set("First", 9i64);

        let mut doc = Document::new("1.5");
        doc.insert_object(IndirectObject::new(3, 0, Stream::new(dict, body.to_vec()).into()));
        doc.compressed.insert(4, (3, 0));
        doc.compressed.insert(5, (3, 1));

        doc.expand_object_streams()?;
        assert_eq!(
            doc.get_object(4).and_then(Object::as_dict).and_then(|d| d.get_integer("A")),
            Some(1)
        );
        assert_eq!(
            doc.get_object(5).and_then(Object::as_string_bytes),
            Some(&b"packed"[..])
        );
        assert!(doc.get_object(3).is_none());
        Ok(())
    }
}
