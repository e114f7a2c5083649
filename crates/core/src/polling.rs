//! Poll cadence constants.

use std::time::Duration;

/// Default interval between status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// Shortest interval allowed.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1000);
/// Longest interval allowed.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Clamp a requested interval into `MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL`.
pub fn clamp_poll_interval(requested: Duration) -> Duration {
    requested.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}
