//! In-memory data store: collections of flat, string-valued items.
//!
//! The [`Store`] maps collection name → item id → [`FieldMap`]. Collections are
//! created implicitly on first insert. Item ids are decimal strings drawn from
//! one counter shared by every collection; ids start at 1 and are never reused,
//! even after the item holding them is removed.
//!
//! All operations go through a single mutex, so concurrent calls from different
//! connections are serialized and observe one linear history. The lock is never
//! held across an `.await`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::fields::FieldMap;

/// Errors returned by mutating store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("item {id} not found in collection {collection}")]
    ItemNotFound { collection: String, id: String },
}

#[derive(Debug)]
struct Inner {
    // Keyed by numeric id so iteration is in ascending id order.
    collections: HashMap<String, BTreeMap<u64, FieldMap>>,
    next_id: u64,
}

/// Thread-safe CRUD store keyed by `(collection, id)`.
///
/// # Examples
///
/// ```
/// use crudhttp::fields::FieldMap;
/// use crudhttp::store::Store;
///
/// let store = Store::new();
/// let mut fields = FieldMap::new();
/// fields.insert("name", "a");
///
/// let id = store.create("users", &fields);
/// assert_eq!(id, "1");
/// assert_eq!(store.read("users", &id).unwrap().get("name"), Some("a"));
/// ```
#[derive(Debug)]
pub struct Store {
    inner: Mutex<Inner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                collections: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    // The maps hold plain data; a panic elsewhere cannot leave them half-updated.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a new item and returns its id.
    ///
    /// The stored record starts with an `id` field holding the new id; any `id`
    /// in `fields` is ignored.
    pub fn create(&self, collection: &str, fields: &FieldMap) -> String {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let id_str = id.to_string();
        inner
            .collections
            .entry(collection.to_owned())
            .or_default()
            .insert(id, FieldMap::with_id(&id_str, fields));
        id_str
    }

    /// Returns a copy of an item, or `None` if the collection or id is absent.
    pub fn read(&self, collection: &str, id: &str) -> Option<FieldMap> {
        let key = parse_id(id)?;
        self.lock().collections.get(collection)?.get(&key).cloned()
    }

    /// Returns every item in `collection` in ascending id order.
    pub fn read_all(&self, collection: &str) -> Vec<FieldMap> {
        self.lock()
            .collections
            .get(collection)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Replaces the fields of an existing item. The stored `id` always equals `id`.
    pub fn update(&self, collection: &str, id: &str, fields: &FieldMap) -> Result<(), StoreError> {
        let key = parse_id(id).ok_or_else(|| not_found(collection, id))?;
        let mut inner = self.lock();
        let item = inner
            .collections
            .get_mut(collection)
            .and_then(|items| items.get_mut(&key))
            .ok_or_else(|| not_found(collection, id))?;
        *item = FieldMap::with_id(id, fields);
        Ok(())
    }

    /// Removes an item.
    pub fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let key = parse_id(id).ok_or_else(|| not_found(collection, id))?;
        self.lock()
            .collections
            .get_mut(collection)
            .and_then(|items| items.remove(&key))
            .map(|_| ())
            .ok_or_else(|| not_found(collection, id))
    }

    /// Number of items currently held in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

// Ids are canonical decimal strings; "01" or "+1" never name an item.
fn parse_id(id: &str) -> Option<u64> {
    let key: u64 = id.parse().ok()?;
    (key.to_string() == id).then_some(key)
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::ItemNotFound {
        collection: collection.to_owned(),
        id: id.to_owned(),
    }
}
