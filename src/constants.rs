//! Constants and timing values for the chaind daemon.

use std::time::Duration;

// ============================================================================
// Statement Retry Timing
// ============================================================================

/// Default delay before a failed statement is attempted again.
/// Overridable per invocation with `--retry-time`.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Logging
// ============================================================================

/// Syslog identity used when `--syslog-ident` is not given.
pub const DEFAULT_SYSLOG_IDENT: &str = "chaind";

/// Syslog facility used when `--syslog-facility` is not given.
pub const DEFAULT_SYSLOG_FACILITY: &str = "daemon";
