//! The offline cache coordinator and the contracts around it.
//!
//! - `CacheCoordinator`: install, activate, fetch interception, messages
//! - `Request` and key derivation for intercepted requests
//! - `WorkerHost`: what the coordinator asks of its host
//! - `ControlMessage`: the page-to-worker control channel

pub mod coordinator;
pub mod host;
pub mod message;
pub mod request;

pub use coordinator::{
    ActivationOutcome, ActivationReport, CacheCoordinator, CacheStatus, EntryStatus, Interception,
    LifecycleState, DEFAULT_FILL_CONCURRENCY,
};
pub use host::WorkerHost;
pub use message::{ControlMessage, FillFailure, FillReport, MessageOutcome};
pub use request::{derive_key, parse_origin, resolve_target, resource_url, Request};
