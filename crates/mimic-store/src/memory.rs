use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use arc_swap::ArcSwap;
use imbl::{OrdMap, Vector};
use mimic_value::{Document, ObjectId, Value, ValueKey};

use crate::error::StoreError;
use crate::store::{Store, Upsert};

/// Documents in insertion order, indexed by `_id`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Collection {
    docs: Vector<Document>,
    ids: OrdMap<ValueKey, usize>,
}

impl Collection {
    fn position_of(&self, id: &Value) -> Option<usize> {
        self.ids.get(&ValueKey::of(id)).copied()
    }
}

/// In-memory [`Store`].
///
/// Readers load a collection snapshot without locking; writers take the
/// write lock, edit a structurally shared copy and swap it in. Each
/// collection keeps an `_id` index, so lookups and writes do not scan.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<ArcSwap<Collection>>>>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    fn handle(&self, name: &str) -> Result<Arc<ArcSwap<Collection>>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
        collections
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    /// Snapshot a collection. Cheap due to imbl structural sharing.
    fn snapshot(&self, name: &str) -> Result<Arc<Collection>, StoreError> {
        Ok(self.handle(name)?.load_full())
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(Collection::default())));
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> Result<bool, StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
        Ok(collections.remove(name).is_some())
    }

    fn has_collection(&self, name: &str) -> Result<bool, StoreError> {
        match self.handle(name) {
            Ok(_) => Ok(true),
            Err(StoreError::CollectionNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn collection_names(&self) -> Result<Vec<String>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Storage(format!("collection map poisoned: {e}")))?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn scan(&self, name: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.snapshot(name)?.docs.iter().cloned().collect())
    }

    fn contains_id(&self, name: &str, id: &Value) -> Result<bool, StoreError> {
        let data = self.snapshot(name)?;
        Ok(data.position_of(id).is_some())
    }

    fn insert_many(&self, name: &str, docs: Vec<Document>) -> Result<Vec<Value>, StoreError> {
        let handle = self.handle(name)?;
        let _guard = self.lock_writes()?;
        let mut data = (**handle.load()).clone();

        let mut ids = Vec::with_capacity(docs.len());
        for mut doc in docs {
            let id = ensure_id(&mut doc);
            let key = ValueKey::of(&id);
            if data.ids.contains_key(&key) {
                return Err(StoreError::DuplicateKey {
                    collection: name.to_string(),
                    id,
                });
            }
            data.ids.insert(key, data.docs.len());
            data.docs.push_back(doc);
            ids.push(id);
        }

        handle.store(Arc::new(data));
        Ok(ids)
    }

    fn upsert(&self, name: &str, mut doc: Document) -> Result<Upsert, StoreError> {
        let handle = self.handle(name)?;
        let _guard = self.lock_writes()?;
        let mut data = (**handle.load()).clone();

        let id = ensure_id(&mut doc);
        let outcome = match data.position_of(&id) {
            Some(idx) => {
                data.docs.set(idx, doc);
                Upsert::Replaced
            }
            None => {
                data.ids.insert(ValueKey::of(&id), data.docs.len());
                data.docs.push_back(doc);
                Upsert::Inserted
            }
        };

        handle.store(Arc::new(data));
        Ok(outcome)
    }

    fn remove_all(&self, name: &str) -> Result<usize, StoreError> {
        let handle = self.handle(name)?;
        let _guard = self.lock_writes()?;
        let removed = handle.swap(Arc::new(Collection::default()));
        Ok(removed.docs.len())
    }
}

/// The document's `_id`, generating and prepending an ObjectId if missing.
fn ensure_id(doc: &mut Document) -> Value {
    match doc.get("_id") {
        Some(id) => id.clone(),
        None => {
            let id = Value::ObjectId(ObjectId::new());
            doc.insert_first("_id", id.clone());
            id
        }
    }
}
