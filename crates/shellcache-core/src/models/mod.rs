//! Data models shared by the coordinator, storage and network layers.
//!
//! - `ResourceManifest`, `BuildManifest`: the build's declared resources
//! - `Response`, `CachedResponse`: fetched and stored resource bodies

pub mod manifest;
pub mod response;

pub use manifest::{BuildManifest, ResourceManifest, ROOT_KEY};
pub use response::{CachedResponse, Response};
