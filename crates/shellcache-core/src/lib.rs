//! Offline cache coordination for web application bundles.
//!
//! A build produces a manifest mapping every resource path to a content
//! fingerprint. The [`CacheCoordinator`] keeps a persistent content cache in
//! step with that manifest across upgrades: unchanged resources are kept,
//! changed or removed ones are evicted, and freshly staged core resources
//! always win. Intercepted requests are then served cache-first, except the
//! root document, which is network-first.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod net;
pub mod worker;

#[cfg(test)]
mod testing;

pub use cache::{CacheStorage, FsStorage, MemoryStorage};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{BuildManifest, CachedResponse, ResourceManifest, Response, ROOT_KEY};
pub use net::{FetchError, FetchMode, Fetcher, HttpFetcher};
pub use worker::{
    ActivationOutcome, ActivationReport, CacheCoordinator, CacheStatus, ControlMessage, FillReport,
    Interception, LifecycleState, MessageOutcome, Request, WorkerHost,
};
