//! Protocol timing configuration.

use std::time::Duration;

/// Default window for one request attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of attempts per request.
pub const DEFAULT_REQUEST_RETRIES: u32 = 3;

/// Default budget for each handshake step.
pub const DEFAULT_HANDSHAKE_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default keep-alive window: no frame for this long drops the link.
pub const DEFAULT_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// First reconnect backoff delay.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Reconnect backoff ceiling.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Timing knobs shared by the session machine and the request paths.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Window for one request attempt.
    pub request_timeout: Duration,
    /// Attempts per request before surfacing a timeout.
    pub request_retries: u32,
    /// Budget for each handshake step.
    pub handshake_step_timeout: Duration,
    /// Idle window before the link is considered dead.
    pub keepalive_timeout: Duration,
    /// First reconnect delay; doubles per failed attempt.
    pub backoff_base: Duration,
    /// Reconnect delay ceiling.
    pub backoff_cap: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_retries: DEFAULT_REQUEST_RETRIES,
            handshake_step_timeout: DEFAULT_HANDSHAKE_STEP_TIMEOUT,
            keepalive_timeout: DEFAULT_KEEPALIVE_TIMEOUT,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
        }
    }
}
