//! The collection store: lazy-loaded in-memory collections mirrored to
//! whole-file JSON arrays on disk.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::StoreConfig;
use crate::error::{Error, Result};

use super::file::{list_collection_files, CollectionFile};
use super::merge::{merge_fields, patch_fields};

/// Cached records of one collection. `None` until first loaded.
type Slot<T> = Arc<Mutex<Option<Vec<T>>>>;

/// A document store holding named collections of `T` records.
///
/// Each collection is loaded from `<root>/<collection>.json` on first access
/// and served from memory afterwards. Every mutation rewrites the whole file
/// before returning.
///
/// Operations on the same collection are serialized; different collections
/// do not block each other.
///
/// # Divergence after a failed write
///
/// Mutations are applied in memory before the file is rewritten and are not
/// rolled back if the write fails. After an `Err` from [`Store::insert`],
/// [`Store::update`] or [`Store::delete`], the cached collection is ahead of
/// disk until a later mutation persists successfully or [`Store::load`]
/// re-reads the file.
pub struct Store<T = Value> {
    config: StoreConfig,
    collections: Mutex<HashMap<String, Slot<T>>>,
}

impl<T> Store<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Open a store rooted at `<cwd>/db`, creating that directory if needed.
    pub fn new() -> Result<Self> {
        Self::open(StoreConfig::from_cwd()?)
    }

    /// Open a store with an explicit configuration.
    pub fn open(config: StoreConfig) -> Result<Self> {
        ensure_root(&config)?;
        Ok(Self {
            config,
            collections: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Re-read a collection from disk, replacing any cached state.
    ///
    /// A missing file is created as `[]`. Returns the number of records loaded.
    pub fn load(&self, collection: &str) -> Result<usize> {
        let file = CollectionFile::new(&self.config.root, collection)?;
        let slot = self.slot(collection);
        let mut cached = lock_slot(&slot);

        let records: Vec<T> = file.read_or_create()?;
        let count = records.len();
        *cached = Some(records);

        tracing::debug!("Loaded collection '{}' ({} records)", collection, count);
        Ok(count)
    }

    /// Append a record and persist the collection.
    pub fn insert(&self, collection: &str, item: T) -> Result<()> {
        self.with_collection(collection, |file, records| {
            records.push(item);
            self.persist(file, records)
        })
    }

    /// All records of a collection, in insertion order.
    pub fn get_all(&self, collection: &str) -> Result<Vec<T>> {
        self.with_collection(collection, |_, records| Ok(records.clone()))
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        self.with_collection(collection, |_, records| Ok(records.len()))
    }

    /// Records matching `predicate`, in their stored order.
    pub fn find<F>(&self, collection: &str, mut predicate: F) -> Result<Vec<T>>
    where
        F: FnMut(&T) -> bool,
    {
        self.try_find(collection, |record| Ok::<_, Error>(predicate(record)))
    }

    /// Like [`Store::find`], with a predicate that can fail.
    ///
    /// The first predicate error aborts the call and is returned as-is.
    pub fn try_find<E, F>(
        &self,
        collection: &str,
        mut predicate: F,
    ) -> std::result::Result<Vec<T>, E>
    where
        E: From<Error>,
        F: FnMut(&T) -> std::result::Result<bool, E>,
    {
        self.with_collection(collection, |_, records| {
            let mut found = Vec::new();
            for record in records.iter() {
                if predicate(record)? {
                    found.push(record.clone());
                }
            }
            Ok(found)
        })
    }

    /// Shallow-merge `patch` into every record matching `predicate` and
    /// persist the collection. Returns the number of records updated.
    ///
    /// `patch` must serialize to a JSON object; its fields replace the
    /// same-named fields of each matching record.
    pub fn update<P, F>(&self, collection: &str, mut predicate: F, patch: &P) -> Result<usize>
    where
        P: Serialize + ?Sized,
        F: FnMut(&T) -> bool,
    {
        self.try_update(collection, |record| Ok::<_, Error>(predicate(record)), patch)
    }

    /// Like [`Store::update`], with a predicate that can fail.
    ///
    /// The replacement records are computed before anything is changed, so a
    /// predicate or merge error leaves the collection untouched.
    pub fn try_update<P, E, F>(
        &self,
        collection: &str,
        mut predicate: F,
        patch: &P,
    ) -> std::result::Result<usize, E>
    where
        P: Serialize + ?Sized,
        E: From<Error>,
        F: FnMut(&T) -> std::result::Result<bool, E>,
    {
        let fields = patch_fields(patch)?;

        self.with_collection(collection, |file, records| {
            let mut replacements = Vec::new();
            for (idx, record) in records.iter().enumerate() {
                if predicate(record)? {
                    replacements.push((idx, merge_fields(record, &fields)?));
                }
            }

            let updated = replacements.len();
            for (idx, merged) in replacements {
                records[idx] = merged;
            }

            self.persist(file, records)?;
            tracing::debug!("Updated {} records in '{}'", updated, file.name());
            Ok(updated)
        })
    }

    /// Remove every record matching `predicate` and persist the collection.
    /// Returns the number of records removed.
    ///
    /// The file is rewritten even when nothing matched.
    pub fn delete<F>(&self, collection: &str, mut predicate: F) -> Result<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.try_delete(collection, |record| Ok::<_, Error>(predicate(record)))
    }

    /// Like [`Store::delete`], with a predicate that can fail.
    pub fn try_delete<E, F>(
        &self,
        collection: &str,
        mut predicate: F,
    ) -> std::result::Result<usize, E>
    where
        E: From<Error>,
        F: FnMut(&T) -> std::result::Result<bool, E>,
    {
        self.with_collection(collection, |file, records| {
            let doomed = records
                .iter()
                .map(|record| predicate(record))
                .collect::<std::result::Result<Vec<bool>, E>>()?;
            let removed = doomed.iter().filter(|d| **d).count();

            let mut doomed = doomed.into_iter();
            records.retain(|_| !doomed.next().unwrap_or(false));

            self.persist(file, records)?;
            tracing::debug!("Deleted {} records from '{}'", removed, file.name());
            Ok(removed)
        })
    }

    /// Names of the collection files present under the root, sorted.
    pub fn list_collections(&self) -> Result<Vec<String>> {
        list_collection_files(&self.config.root)
    }

    /// Run `f` against the cached collection, loading it first if needed.
    /// The collection stays locked for the whole call.
    fn with_collection<R, E, F>(&self, collection: &str, f: F) -> std::result::Result<R, E>
    where
        E: From<Error>,
        F: FnOnce(&CollectionFile, &mut Vec<T>) -> std::result::Result<R, E>,
    {
        let file = CollectionFile::new(&self.config.root, collection)?;
        let slot = self.slot(collection);
        let mut cached = lock_slot(&slot);

        let records = match cached.take() {
            Some(records) => records,
            None => {
                let records: Vec<T> = file.read_or_create()?;
                tracing::debug!(
                    "Loaded collection '{}' on first access ({} records)",
                    collection,
                    records.len()
                );
                records
            }
        };

        f(&file, cached.insert(records))
    }

    fn persist(&self, file: &CollectionFile, records: &[T]) -> Result<()> {
        match file.write(records, self.config.indent, self.config.atomic_writes) {
            Ok(()) => {
                tracing::debug!(
                    "Persisted collection '{}' ({} records)",
                    file.name(),
                    records.len()
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to persist collection '{}'; memory is ahead of {}: {}",
                    file.name(),
                    file.path().display(),
                    e
                );
                Err(e)
            }
        }
    }

    fn slot(&self, collection: &str) -> Slot<T> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        collections.entry(collection.to_string()).or_default().clone()
    }
}

/// Lock a collection slot, recovering from a panic in an earlier holder.
///
/// Caller code (predicates) only runs before the cached records change, so
/// a poisoned slot still holds a consistent sequence.
fn lock_slot<T>(slot: &Slot<T>) -> MutexGuard<'_, Option<Vec<T>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create the root directory if it is missing.
fn ensure_root(config: &StoreConfig) -> Result<()> {
    let root = &config.root;

    if root.is_dir() {
        return Ok(());
    }
    if root.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("store root {} is not a directory", root.display()),
        )));
    }

    let created = if config.create_parents {
        fs::create_dir_all(root)
    } else {
        fs::create_dir(root)
    };

    match created {
        Ok(()) => {
            tracing::info!("Created store root: {}", root.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && root.is_dir() => Ok(()),
        Err(e) => Err(e.into()),
    }
}
