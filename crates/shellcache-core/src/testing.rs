//! Test doubles for the storage, network and host seams.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::cache::{CacheStorage, MemoryStorage};
use crate::error::{Error, Result};
use crate::models::{CachedResponse, Response};
use crate::net::{FetchError, FetchMode, Fetcher};
use crate::worker::WorkerHost;

pub const ORIGIN: &str = "https://app.example.com";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Fetcher serving canned responses keyed by absolute URL.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, Response>>,
    unreachable: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<(String, FetchMode)>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for the resource path.
    pub fn serve(&self, path: &str, body: &str) {
        self.serve_status(path, 200, body);
    }

    pub fn serve_status(&self, path: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url(path).to_string(), Response::new(status, body.to_string()));
    }

    /// Make a single path fail at the transport level.
    pub fn fail(&self, path: &str) {
        self.unreachable.lock().unwrap().insert(url(path).to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, FetchMode)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        let target = url(path).to_string();
        self.calls().iter().filter(|(u, _)| *u == target).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> std::result::Result<Response, FetchError> {
        let target = url.to_string();
        self.calls.lock().unwrap().push((target.clone(), mode));

        if self.offline.load(Ordering::SeqCst) || self.unreachable.lock().unwrap().contains(&target) {
            return Err(FetchError::Connection(format!("{} unreachable", target)));
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&target)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "not found")))
    }
}

#[derive(Default)]
pub struct RecordingHost {
    pub skip_waiting: AtomicUsize,
    pub claims: AtomicUsize,
}

impl RecordingHost {
    pub fn claims(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub fn skips(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }
}

impl WorkerHost for RecordingHost {
    fn skip_waiting(&self) {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
    }

    fn claim_clients(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }
}

/// Memory storage whose writes to one bucket fail while armed.
pub struct FailingStorage {
    inner: MemoryStorage,
    bucket: String,
    armed: AtomicBool,
}

impl FailingStorage {
    pub fn new(bucket: &str) -> Self {
        Self {
            inner: MemoryStorage::new(),
            bucket: bucket.to_string(),
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for FailingStorage {
    async fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        self.inner.keys(bucket).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>> {
        self.inner.get(bucket, key).await
    }

    async fn put(&self, bucket: &str, key: &str, entry: &CachedResponse) -> Result<()> {
        if self.armed.load(Ordering::SeqCst) && bucket == self.bucket {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        self.inner.put(bucket, key, entry).await
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<bool> {
        self.inner.remove(bucket, key).await
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<bool> {
        self.inner.delete_bucket(bucket).await
    }

    async fn has_bucket(&self, bucket: &str) -> Result<bool> {
        self.inner.has_bucket(bucket).await
    }
}
