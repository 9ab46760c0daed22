//! Awaitable facade over [`Store`].
//!
//! Each call runs the synchronous operation on tokio's blocking pool, so file
//! I/O never stalls the async executor.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::{Error, Result};

use super::store::Store;

pub struct AsyncStore<T = Value> {
    inner: Arc<Store<T>>,
}

impl<T> Clone for AsyncStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> AsyncStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    /// Open a store rooted at `<cwd>/db`.
    pub async fn new() -> Result<Self> {
        Self::open(StoreConfig::from_cwd()?).await
    }

    pub async fn open(config: StoreConfig) -> Result<Self> {
        let store = run_blocking(move || Store::open(config)).await?;
        Ok(Self::from_store(store))
    }

    pub fn from_store(store: Store<T>) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// The shared synchronous store.
    pub fn store(&self) -> &Arc<Store<T>> {
        &self.inner
    }

    pub async fn load(&self, collection: &str) -> Result<usize> {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.load(&collection)).await
    }

    pub async fn insert(&self, collection: &str, item: T) -> Result<()> {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.insert(&collection, item)).await
    }

    pub async fn get_all(&self, collection: &str) -> Result<Vec<T>> {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.get_all(&collection)).await
    }

    pub async fn count(&self, collection: &str) -> Result<usize> {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.count(&collection)).await
    }

    pub async fn find<F>(&self, collection: &str, predicate: F) -> Result<Vec<T>>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.find(&collection, predicate)).await
    }

    pub async fn update<P, F>(&self, collection: &str, predicate: F, patch: P) -> Result<usize>
    where
        P: Serialize + Send + 'static,
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.update(&collection, predicate, &patch)).await
    }

    pub async fn delete<F>(&self, collection: &str, predicate: F) -> Result<usize>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.delete(&collection, predicate)).await
    }

    /// Like [`AsyncStore::find`], with a predicate that can fail. The
    /// predicate's error is returned as-is.
    pub async fn try_find<E, F>(
        &self,
        collection: &str,
        predicate: F,
    ) -> std::result::Result<Vec<T>, E>
    where
        E: From<Error> + Send + 'static,
        F: FnMut(&T) -> std::result::Result<bool, E> + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.try_find(&collection, predicate)).await
    }

    pub async fn try_update<P, E, F>(
        &self,
        collection: &str,
        predicate: F,
        patch: P,
    ) -> std::result::Result<usize, E>
    where
        P: Serialize + Send + 'static,
        E: From<Error> + Send + 'static,
        F: FnMut(&T) -> std::result::Result<bool, E> + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.try_update(&collection, predicate, &patch)).await
    }

    pub async fn try_delete<E, F>(
        &self,
        collection: &str,
        predicate: F,
    ) -> std::result::Result<usize, E>
    where
        E: From<Error> + Send + 'static,
        F: FnMut(&T) -> std::result::Result<bool, E> + Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let collection = collection.to_string();
        run_blocking(move || store.try_delete(&collection, predicate)).await
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let store = Arc::clone(&self.inner);
        run_blocking(move || store.list_collections()).await
    }
}

async fn run_blocking<R, E, F>(f: F) -> std::result::Result<R, E>
where
    F: FnOnce() -> std::result::Result<R, E> + Send + 'static,
    R: Send + 'static,
    E: From<Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| E::from(Error::Task(e.to_string())))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn open_store(temp_dir: &TempDir) -> AsyncStore {
        AsyncStore::open(StoreConfig::default().with_root(temp_dir.path().join("db")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_async_crud() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store.insert("users", json!({"name": "a", "age": 1})).await.unwrap();
        store.insert("users", json!({"name": "b", "age": 2})).await.unwrap();

        let found = store.find("users", |r| r["age"] == 2).await.unwrap();
        assert_eq!(found, vec![json!({"name": "b", "age": 2})]);

        let updated = store
            .update("users", |r| r["name"] == "a", json!({"age": 5}))
            .await
            .unwrap();
        assert_eq!(updated, 1);

        assert_eq!(store.delete("users", |r| r["name"] == "b").await.unwrap(), 1);
        assert_eq!(
            store.get_all("users").await.unwrap(),
            vec![json!({"name": "a", "age": 5})]
        );
        assert_eq!(store.list_collections().await.unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_async_concurrent_inserts() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.insert("events", json!({"i": i})).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.count("events").await.unwrap(), 20);
        assert_eq!(store.load("events").await.unwrap(), 20);
    }

    #[derive(Debug, PartialEq)]
    enum Rejected {
        Store(String),
        Record(i64),
    }

    impl From<Error> for Rejected {
        fn from(e: Error) -> Self {
            Rejected::Store(e.to_string())
        }
    }

    fn reject_two(r: &Value) -> std::result::Result<bool, Rejected> {
        match r["n"].as_i64() {
            Some(2) => Err(Rejected::Record(2)),
            _ => Ok(true),
        }
    }

    #[tokio::test]
    async fn test_async_predicate_errors_propagate_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        for n in 1..=3 {
            store.insert("nums", json!({"n": n})).await.unwrap();
        }

        assert_eq!(store.try_find("nums", reject_two).await, Err(Rejected::Record(2)));
        assert_eq!(
            store.try_update("nums", reject_two, json!({"n": 0})).await,
            Err(Rejected::Record(2))
        );
        assert_eq!(store.try_delete("nums", reject_two).await, Err(Rejected::Record(2)));
        assert_eq!(store.count("nums").await.unwrap(), 3);

        let odd = store
            .try_find("nums", |r: &Value| Ok::<_, Rejected>(r["n"] != 2))
            .await
            .unwrap();
        assert_eq!(odd, vec![json!({"n": 1}), json!({"n": 3})]);

        let bad_name = store.try_delete("../x", |_: &Value| Ok::<_, Rejected>(true)).await;
        assert!(matches!(bad_name, Err(Rejected::Store(_))));
    }

    #[tokio::test]
    async fn test_async_errors_surface() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        assert!(matches!(
            store.load("../x").await,
            Err(Error::InvalidCollection(_))
        ));
    }
}
