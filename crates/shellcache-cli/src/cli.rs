use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shellcache_core::Config;

#[derive(Parser, Debug)]
#[command(
    name = "shellcache",
    about = "Keep an offline cache of a web application bundle in step with its build manifest",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Origin the application is served from
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// Build manifest JSON ({"resources": {...}, "core": [...]})
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage the core resources and reconcile the cache with the manifest
    Upgrade,

    /// Request a resource through the cache
    Get {
        /// Absolute URL, or a path relative to the origin
        target: String,

        /// Write the body to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Send a control message (skipWaiting, downloadOffline)
    Message {
        name: String,
    },

    /// Show bucket contents and offline coverage
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    /// Flags take precedence over the config file and environment.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref origin) = self.origin {
            config.origin = Some(origin.clone());
        }
        if let Some(ref manifest) = self.manifest {
            config.manifest_path = Some(manifest.clone());
        }
        if let Some(ref dir) = self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
    }
}
