// Service constants (no magic values)
use std::time::Duration;

/// Concurrent cfm-predict processes allowed by default
pub const DEFAULT_MAX_CONCURRENT_PREDICTIONS: usize = 4;

/// Time a timed-out child gets between SIGTERM and SIGKILL
pub const GRACEFUL_KILL_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll interval while waiting for a terminated child to exit
pub const KILL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on draining in-flight requests at shutdown
pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(35);

/// Chunks buffered between the child's pipes and the response body
pub const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Stderr bytes kept for the failure log line
pub const STDERR_LOG_LIMIT: usize = 2048;
