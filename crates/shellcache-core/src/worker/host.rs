//! Contract between the coordinator and the environment driving it.

/// Operations the coordinator requests from its host.
///
/// Hosts defer completion of install and activation by awaiting the
/// coordinator's futures; there is no separate wait-until hook.
pub trait WorkerHost: Send + Sync {
    /// Activate this worker version without waiting for older ones to release control.
    fn skip_waiting(&self);

    /// Take control of every open client. Called once per successful activation.
    fn claim_clients(&self);
}

