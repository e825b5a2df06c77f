//! Offline cache coordinator.
//!
//! Keeps the content cache consistent with the build manifest across worker
//! upgrades and answers intercepted requests from it.
//!
//! Lifecycle: `install` stages the core resources, `activate` reconciles the
//! content cache against the version record and promotes the staged
//! resources. Requests and control messages may arrive at any time.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use super::host::WorkerHost;
use super::message::{ControlMessage, FillFailure, FillReport, MessageOutcome};
use super::request::{derive_key, entry_key, resource_url, Request};
use crate::cache::{CacheStorage, CONTENT_BUCKET, MANIFEST_BUCKET, MANIFEST_ENTRY, TEMP_BUCKET};
use crate::error::{Error, Result};
use crate::models::{BuildManifest, CachedResponse, ResourceManifest, Response, ROOT_KEY};
use crate::net::{FetchError, FetchMode, Fetcher};

/// Maximum number of concurrent fetches during an offline fill.
pub const DEFAULT_FILL_CONCURRENCY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this worker version is discarded.
    Redundant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// No version record existed, so the content cache was rebuilt from scratch.
    pub first_install: bool,
    pub preserved: usize,
    pub evicted: usize,
    pub promoted: usize,
}

/// How an activation ended. Activation never fails outright: any error while
/// reconciling wipes all three buckets and the worker runs with an empty cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated(ActivationReport),
    ResetAndDegraded { reason: String },
}

/// Whether the coordinator answered a request or left it to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    Passthrough,
    Respond(Response),
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryStatus {
    pub key: String,
    pub status: u16,
    pub bytes: usize,
    pub age: String,
    /// Listed in the current manifest.
    pub current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub lifecycle: LifecycleState,
    pub recorded_manifest: Option<ResourceManifest>,
    pub record_is_current: bool,
    pub staged: Vec<String>,
    pub entries: Vec<EntryStatus>,
    /// Manifest keys with no content cache entry.
    pub missing: Vec<String>,
}

pub struct CacheCoordinator {
    origin: Url,
    manifest: BuildManifest,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn WorkerHost>,
    fill_concurrency: usize,
    state: Mutex<LifecycleState>,
}

impl CacheCoordinator {
    pub fn new(
        origin: Url,
        manifest: BuildManifest,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        host: Arc<dyn WorkerHost>,
    ) -> Self {
        Self {
            origin,
            manifest,
            storage,
            fetcher,
            host,
            fill_concurrency: DEFAULT_FILL_CONCURRENCY,
            state: Mutex::new(LifecycleState::Parsed),
        }
    }

    pub fn with_fill_concurrency(mut self, concurrency: usize) -> Self {
        self.fill_concurrency = concurrency.max(1);
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    pub async fn lifecycle(&self) -> LifecycleState {
        *self.state.lock().await
    }

    async fn set_state(&self, state: LifecycleState) {
        *self.state.lock().await = state;
    }

    // ===== Install =====

    /// Stage every core resource in the temp bucket.
    ///
    /// Any failed fetch fails the install; nothing staged so far survives and
    /// the coordinator becomes redundant.
    pub async fn install(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if *state != LifecycleState::Parsed {
                return Err(Error::Lifecycle(format!("cannot install from {:?}", *state)));
            }
            *state = LifecycleState::Installing;
        }

        self.host.skip_waiting();

        match self.stage_core().await {
            Ok(staged) => {
                info!(staged, "Installed core resources");
                self.set_state(LifecycleState::Installed).await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Install failed");
                if let Err(cleanup) = self.storage.delete_bucket(TEMP_BUCKET).await {
                    warn!(error = %cleanup, "Failed to discard partial staging");
                }
                self.set_state(LifecycleState::Redundant).await;
                Err(e)
            }
        }
    }

    async fn stage_core(&self) -> Result<usize> {
        for key in &self.manifest.core {
            let url = resource_url(&self.origin, key)?;
            let response = self
                .fetcher
                .fetch(&url, FetchMode::Reload)
                .await
                .map_err(|e| Error::fetch(key, e))?;

            if !response.is_ok() {
                return Err(Error::fetch(
                    key,
                    FetchError::from_status(response.status, url.as_str()),
                ));
            }

            self.storage
                .put(TEMP_BUCKET, key, &CachedResponse::from_response(response))
                .await?;
            debug!(key = %key, "Staged core resource");
        }
        Ok(self.manifest.core.len())
    }

    // ===== Activate =====

    /// Reconcile the content cache with the current manifest and promote the
    /// staged core resources.
    ///
    /// Requires a completed install, or a previous activation, on this
    /// coordinator. Only a lifecycle violation is returned as an error.
    pub async fn activate(&self) -> Result<ActivationOutcome> {
        {
            let mut state = self.state.lock().await;
            match *state {
                LifecycleState::Installed | LifecycleState::Activated => {
                    *state = LifecycleState::Activating;
                }
                other => {
                    return Err(Error::Lifecycle(format!("cannot activate from {:?}", other)));
                }
            }
        }

        let outcome = match self.reconcile().await {
            Ok(report) => {
                self.host.claim_clients();
                info!(
                    first_install = report.first_install,
                    preserved = report.preserved,
                    evicted = report.evicted,
                    promoted = report.promoted,
                    "Activated"
                );
                ActivationOutcome::Activated(report)
            }
            Err(e) => {
                error!(error = %e, "Failed to upgrade offline cache, resetting all buckets");
                self.reset_all().await;
                ActivationOutcome::ResetAndDegraded {
                    reason: e.to_string(),
                }
            }
        };

        self.set_state(LifecycleState::Activated).await;
        Ok(outcome)
    }

    async fn reconcile(&self) -> Result<ActivationReport> {
        let mut report = ActivationReport::default();

        match self.read_version_record().await? {
            None => {
                report.first_install = true;
                report.evicted = self.storage.keys(CONTENT_BUCKET).await?.len();
                self.storage.delete_bucket(CONTENT_BUCKET).await?;
            }
            Some(previous) => {
                // Evict before promoting so staged entries are never evicted
                for name in self.storage.keys(CONTENT_BUCKET).await? {
                    let key = entry_key(&name);
                    if self.manifest.resources.retains(&previous, key) {
                        report.preserved += 1;
                    } else {
                        self.storage.remove(CONTENT_BUCKET, &name).await?;
                        report.evicted += 1;
                        debug!(key = %key, "Evicted stale resource");
                    }
                }
            }
        }

        report.promoted = self.promote_staged().await?;
        self.storage.delete_bucket(TEMP_BUCKET).await?;
        self.write_version_record().await?;
        Ok(report)
    }

    async fn promote_staged(&self) -> Result<usize> {
        let staged = self.storage.keys(TEMP_BUCKET).await?;
        for key in &staged {
            if let Some(entry) = self.storage.get(TEMP_BUCKET, key).await? {
                self.storage.put(CONTENT_BUCKET, key, &entry).await?;
            }
        }
        Ok(staged.len())
    }

    async fn read_version_record(&self) -> Result<Option<ResourceManifest>> {
        match self.storage.get(MANIFEST_BUCKET, MANIFEST_ENTRY).await? {
            Some(entry) => Ok(Some(ResourceManifest::from_json(&entry.body)?)),
            None => Ok(None),
        }
    }

    async fn write_version_record(&self) -> Result<()> {
        let record = Response::new(200, self.manifest.resources.to_json()?)
            .with_content_type("application/json");
        self.storage
            .put(MANIFEST_BUCKET, MANIFEST_ENTRY, &CachedResponse::from_response(record))
            .await
    }

    async fn reset_all(&self) {
        for bucket in [CONTENT_BUCKET, TEMP_BUCKET, MANIFEST_BUCKET] {
            if let Err(e) = self.storage.delete_bucket(bucket).await {
                warn!(bucket, error = %e, "Failed to delete bucket during reset");
            }
        }
    }

    // ===== Fetch =====

    /// Answer a request from the cache, or leave it to the network.
    ///
    /// Only same-origin GET requests for manifest resources are intercepted.
    /// The root document is served network-first, everything else
    /// cache-first.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Interception> {
        if request.method != reqwest::Method::GET {
            return Ok(Interception::Passthrough);
        }

        let Some(key) = derive_key(&self.origin, &request.url) else {
            return Ok(Interception::Passthrough);
        };

        if !self.manifest.resources.contains(&key) {
            debug!(key = %key, "Not a manifest resource, passing through");
            return Ok(Interception::Passthrough);
        }

        let response = if key == ROOT_KEY {
            self.network_first(&key, &request.url).await?
        } else {
            self.cache_first(&key, &request.url).await?
        };
        Ok(Interception::Respond(response))
    }

    /// Plain network fetch for requests the coordinator did not intercept.
    pub async fn passthrough(&self, request: &Request) -> Result<Response> {
        self.fetcher
            .fetch(&request.url, FetchMode::Default)
            .await
            .map_err(|e| Error::fetch(request.url.as_str(), e))
    }

    /// Content cache lookup. An unreadable entry is dropped and reported as a
    /// miss so the resource is fetched again.
    async fn cached(&self, key: &str) -> Result<Option<CachedResponse>> {
        match self.storage.get(CONTENT_BUCKET, key).await {
            Err(Error::CorruptEntry { reason, .. }) => {
                warn!(key, reason, "Discarding corrupt cache entry");
                if let Err(e) = self.storage.remove(CONTENT_BUCKET, key).await {
                    warn!(key, error = %e, "Failed to remove corrupt cache entry");
                }
                Ok(None)
            }
            other => other,
        }
    }

    async fn cache_first(&self, key: &str, url: &Url) -> Result<Response> {
        if let Some(entry) = self.cached(key).await? {
            debug!(key, "Serving from cache");
            return Ok(entry.into_response());
        }

        let response = self
            .fetcher
            .fetch(url, FetchMode::Default)
            .await
            .map_err(|e| Error::fetch(key, e))?;

        if response.is_ok() {
            self.store_copy(key, &response).await;
        }
        Ok(response)
    }

    async fn network_first(&self, key: &str, url: &Url) -> Result<Response> {
        match self.fetcher.fetch(url, FetchMode::Default).await {
            Ok(response) => {
                if response.is_ok() {
                    self.store_copy(key, &response).await;
                }
                Ok(response)
            }
            Err(network_error) => {
                warn!(key, error = %network_error, "Network unavailable, falling back to cache");
                match self.cached(key).await {
                    Ok(Some(entry)) => Ok(entry.into_response()),
                    Ok(None) => Err(Error::fetch(key, network_error)),
                    Err(e) => {
                        warn!(key, error = %e, "Cache fallback failed");
                        Err(Error::fetch(key, network_error))
                    }
                }
            }
        }
    }

    /// Cache a response for later requests. A failed write only costs a
    /// future cache miss, so it is logged rather than returned.
    async fn store_copy(&self, key: &str, response: &Response) {
        let entry = CachedResponse::from_response(response.clone());
        if let Err(e) = self.storage.put(CONTENT_BUCKET, key, &entry).await {
            warn!(key, error = %e, "Failed to cache response");
        }
    }

    // ===== Messages =====

    /// Handle a control message from the host page. Unknown messages are ignored.
    pub async fn handle_message(&self, raw: &str) -> Result<MessageOutcome> {
        match ControlMessage::parse(raw) {
            Some(ControlMessage::SkipWaiting) => {
                self.host.skip_waiting();
                Ok(MessageOutcome::SkippedWaiting)
            }
            Some(ControlMessage::DownloadOffline) => {
                Ok(MessageOutcome::OfflineFill(self.download_offline().await?))
            }
            None => {
                debug!(msg = raw, "Ignoring unknown control message");
                Ok(MessageOutcome::Ignored)
            }
        }
    }

    /// Fetch and cache every manifest resource missing from the content
    /// cache. Never evicts. Individual failures are collected in the report.
    pub async fn download_offline(&self) -> Result<FillReport> {
        let cached: HashSet<String> = self
            .storage
            .keys(CONTENT_BUCKET)
            .await?
            .iter()
            .map(|name| entry_key(name).to_string())
            .collect();

        let missing: Vec<String> = self
            .manifest
            .resources
            .keys()
            .filter(|key| !cached.contains(*key))
            .map(str::to_string)
            .collect();

        let mut report = FillReport {
            already_cached: self.manifest.resources.len() - missing.len(),
            ..FillReport::default()
        };

        let results: Vec<(String, Result<()>)> = stream::iter(missing)
            .map(|key| async move {
                let result = self.fill_one(&key).await;
                (key, result)
            })
            .buffer_unordered(self.fill_concurrency)
            .collect()
            .await;

        for (key, result) in results {
            match result {
                Ok(()) => report.fetched.push(key),
                Err(e) => {
                    warn!(key = %key, error = %e, "Offline fill failed for resource");
                    report.failed.push(FillFailure {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.fetched.sort();
        report.failed.sort_by(|a, b| a.key.cmp(&b.key));

        info!(
            fetched = report.fetched.len(),
            already_cached = report.already_cached,
            failed = report.failed.len(),
            "Offline fill finished"
        );
        Ok(report)
    }

    async fn fill_one(&self, key: &str) -> Result<()> {
        let url = resource_url(&self.origin, key)?;
        let response = self
            .fetcher
            .fetch(&url, FetchMode::Default)
            .await
            .map_err(|e| Error::fetch(key, e))?;

        if !response.is_ok() {
            return Err(Error::fetch(
                key,
                FetchError::from_status(response.status, url.as_str()),
            ));
        }

        self.storage
            .put(CONTENT_BUCKET, key, &CachedResponse::from_response(response))
            .await
    }

    // ===== Status =====

    pub async fn status(&self) -> Result<CacheStatus> {
        let recorded_manifest = self.read_version_record().await?;
        let record_is_current = recorded_manifest.as_ref() == Some(&self.manifest.resources);
        let staged = self.storage.keys(TEMP_BUCKET).await?;

        let mut entries = Vec::new();
        for name in self.storage.keys(CONTENT_BUCKET).await? {
            let Some(entry) = self.storage.get(CONTENT_BUCKET, &name).await? else {
                continue;
            };
            let key = entry_key(&name).to_string();
            entries.push(EntryStatus {
                current: self.manifest.resources.contains(&key),
                status: entry.status,
                bytes: entry.size(),
                age: entry.age_display(),
                key,
            });
        }

        let cached: HashSet<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        let missing = self
            .manifest
            .resources
            .keys()
            .filter(|key| !cached.contains(key))
            .map(str::to_string)
            .collect();

        Ok(CacheStatus {
            lifecycle: self.lifecycle().await,
            recorded_manifest,
            record_is_current,
            staged,
            entries,
            missing,
        })
    }
}
