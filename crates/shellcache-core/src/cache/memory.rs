use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CacheStorage;
use crate::error::Result;
use crate::models::CachedResponse;

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buckets: RwLock<HashMap<String, BTreeMap<String, CachedResponse>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>> {
        let buckets = self.buckets.read().await;
        Ok(buckets.get(bucket).and_then(|entries| entries.get(key)).cloned())
    }

    async fn put(&self, bucket: &str, key: &str, entry: &CachedResponse) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<bool> {
        let mut buckets = self.buckets.write().await;
        Ok(buckets
            .get_mut(bucket)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.write().await.remove(bucket).is_some())
    }

    async fn has_bucket(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.read().await.contains_key(bucket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Response;

    fn entry(body: &str) -> CachedResponse {
        CachedResponse::from_response(Response::new(200, body.to_string()))
    }

    #[tokio::test]
    async fn test_buckets_are_created_lazily() {
        let storage = MemoryStorage::new();
        assert!(!storage.has_bucket("b").await.unwrap());
        assert!(storage.keys("b").await.unwrap().is_empty());

        storage.put("b", "k", &entry("v")).await.unwrap();
        assert!(storage.has_bucket("b").await.unwrap());
        assert_eq!(storage.keys("b").await.unwrap(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_and_delete_bucket() {
        let storage = MemoryStorage::new();
        storage.put("b", "k1", &entry("1")).await.unwrap();
        storage.put("b", "k2", &entry("2")).await.unwrap();

        assert!(storage.remove("b", "k1").await.unwrap());
        assert!(!storage.remove("b", "k1").await.unwrap());
        assert!(!storage.remove("other", "k1").await.unwrap());
        assert_eq!(storage.get("b", "k2").await.unwrap().unwrap().body, "2");

        assert!(storage.delete_bucket("b").await.unwrap());
        assert!(!storage.delete_bucket("b").await.unwrap());
        assert!(storage.get("b", "k2").await.unwrap().is_none());
    }
}
