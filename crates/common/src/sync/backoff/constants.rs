// Constants for backoff module
use std::time::Duration;

/// Default first delay after an ordinary failure
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(300);

/// Default first delay after network, migration or conflict failures
pub const DEFAULT_SHORT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Default maximum delay cap
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Default growth factor between consecutive delays
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Default jitter factor (0.0 = no jitter, 1.0 = up to double)
pub const DEFAULT_JITTER_FACTOR: f64 = 0.0;

/// Throttle length used when the server does not say how long to wait
pub const DEFAULT_THROTTLE_DELAY: Duration = Duration::from_secs(2 * 3600);

/// Upper bound applied to server-supplied throttle lengths
pub const DEFAULT_MAX_THROTTLE: Duration = Duration::from_secs(24 * 3600);

/// Maximum exponent for exponential backoff calculation to prevent overflow
pub const MAX_BACKOFF_EXPONENT: u32 = 30;

/// Smallest growth step, so a delay always strictly increases below the cap
pub const MIN_BACKOFF_STEP: Duration = Duration::from_millis(1);
