//! Ordered string-to-string records.
//!
//! [`FieldMap`] backs query parameters, decoded form fields, and the items held
//! by the [`Store`](crate::store::Store). Keys are case-sensitive, insertion
//! order is preserved, and inserting an existing key replaces its value in place.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// An insertion-ordered, last-write-wins map of string fields.
///
/// # Examples
///
/// ```
/// use crudhttp::fields::FieldMap;
///
/// let mut fields = FieldMap::new();
/// fields.insert("name", "John");
/// fields.insert("email", "john@example.com");
/// fields.insert("name", "Jane");
///
/// assert_eq!(fields.get("name"), Some("Jane"));
/// let keys: Vec<_> = fields.iter().map(|(k, _)| k).collect();
/// assert_eq!(keys, vec!["name", "email"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    inner: Vec<(String, String)>,
}

impl FieldMap {
    /// Creates an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing the value of an existing field with the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.inner.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.inner.push((key, value)),
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.inner.iter().position(|(k, _)| k == key)?;
        Some(self.inner.remove(pos).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Builds a record whose first field is `id`, followed by every field of
    /// `fields` except any `id` it carries.
    pub fn with_id(id: &str, fields: &FieldMap) -> Self {
        let mut inner = Vec::with_capacity(fields.len() + 1);
        inner.push(("id".to_owned(), id.to_owned()));
        inner.extend(
            fields
                .inner
                .iter()
                .filter(|(k, _)| k != "id")
                .cloned(),
        );
        Self { inner }
    }
}

impl<K, V> FromIterator<(K, V)> for FieldMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inner.len()))?;
        for (k, v) in &self.inner {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut f = FieldMap::new();
        f.insert("a", "1");
        f.insert("b", "2");
        f.insert("a", "3");
        let pairs: Vec<_> = f.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn keys_are_case_sensitive() {
        let mut f = FieldMap::new();
        f.insert("Name", "x");
        assert_eq!(f.get("name"), None);
        assert!(f.contains_key("Name"));
    }

    #[test]
    fn with_id_puts_id_first_and_drops_payload_id() {
        let payload: FieldMap = [("name", "a"), ("id", "999"), ("email", "e")]
            .into_iter()
            .collect();
        let item = FieldMap::with_id("7", &payload);
        let pairs: Vec<_> = item.iter().collect();
        assert_eq!(pairs, vec![("id", "7"), ("name", "a"), ("email", "e")]);
    }

    #[test]
    fn serializes_as_json_object_in_order() {
        let f: FieldMap = [("id", "1"), ("name", "John")].into_iter().collect();
        assert_eq!(
            serde_json::to_string(&f).unwrap(),
            r#"{"id":"1","name":"John"}"#
        );
    }

    #[test]
    fn remove_returns_value() {
        let mut f: FieldMap = [("a", "1")].into_iter().collect();
        assert_eq!(f.remove("a").as_deref(), Some("1"));
        assert!(f.is_empty());
        assert_eq!(f.remove("a"), None);
    }
}
