//! Network access for the coordinator.
//!
//! `Fetcher` is the seam the coordinator fetches through; `HttpFetcher`
//! is the reqwest-backed implementation used by real hosts.

pub mod error;
pub mod fetcher;

pub use error::FetchError;
pub use fetcher::{FetchMode, Fetcher, HttpFetcher};
