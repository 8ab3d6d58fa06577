//! Portal client configuration from the environment
//!
//! Environment access goes through [`EnvConfig`] so tests can inject values
//! without touching process-global state.

use std::time::Duration;

/// Set to `1` to skip TLS certificate verification against the portal
pub const INSECURE_SKIP_VERIFY_ENV: &str = "INSECURE_SKIP_VERIFY_CLIENT";

/// Set to `1` to log every portal request and response
pub const PORTAL_DEBUG_ENV: &str = "THREESCALE_DEBUG";

/// Default per-request timeout
pub const DEFAULT_PORTAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for reading environment variables
#[cfg_attr(test, mockall::automock)]
pub trait EnvConfig: Send + Sync {
    /// Value of the variable, if set
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment
#[derive(Clone, Default)]
pub struct OsEnvConfig;

impl EnvConfig for OsEnvConfig {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

fn flag(env: &dyn EnvConfig, key: &str) -> bool {
    env.var(key).is_some_and(|v| v == "1")
}

/// Transport settings for [`crate::HttpPortalClient`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortalClientConfig {
    /// Accept any server certificate
    pub insecure_skip_verify: bool,
    /// Log request/response metadata at debug level
    pub debug: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for PortalClientConfig {
    fn default() -> Self {
        Self {
            insecure_skip_verify: false,
            debug: false,
            timeout: DEFAULT_PORTAL_TIMEOUT,
        }
    }
}

impl PortalClientConfig {
    /// Build the config from environment flags
    pub fn from_env(env: &dyn EnvConfig) -> Self {
        Self {
            insecure_skip_verify: flag(env, INSECURE_SKIP_VERIFY_ENV),
            debug: flag(env, PORTAL_DEBUG_ENV),
            ..Default::default()
        }
    }
}
