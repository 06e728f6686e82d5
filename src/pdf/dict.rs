//! PDF dictionary implementation

use indexmap::IndexMap;

use super::{Object, ObjectId};

/// PDF dictionary object, entries kept in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<Vec<u8>, Object>,
}

impl Dictionary {
    /// Create new dictionary
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Get value by key
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(key.as_bytes())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.entries.get_mut(key.as_bytes())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key.as_bytes())
    }

    /// Get integer value
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_integer)
    }

    /// Get boolean value
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Object::as_bool)
    }

    /// Get name value
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name_str)
    }

    /// Get string bytes
    pub fn get_string(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Object::as_string_bytes)
    }

    /// Get reference value
    pub fn get_reference(&self, key: &str) -> Option<ObjectId> {
        self.get(key).and_then(Object::as_reference)
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<Object>> {
        self.get(key).and_then(Object::as_array)
    }

    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        match self.get(key) {
            Some(Object::Dictionary(d)) => Some(d),
            _ => None,
        }
    }

    /// Check `/Type` against a name
    pub fn has_type(&self, name: &str) -> bool {
        self.get_name("Type") == Some(name)
    }

    /// Set value
    pub fn set(&mut self, key: &str, value: impl Into<Object>) {
        self.entries.insert(key.as_bytes().to_vec(), value.into());
    }

    /// Set value under a raw name key
    pub fn set_raw(&mut self, key: Vec<u8>, value: Object) {
        self.entries.insert(key, value);
    }

    /// Remove value, keeping the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.shift_remove(key.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Object)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Vec<u8>, &mut Object)> {
        self.entries.iter_mut()
    }

    pub fn values(&self) -> impl Iterator<Item = &Object> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.entries.values_mut()
    }
}
