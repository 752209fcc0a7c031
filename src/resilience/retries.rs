//! Accept error retry policy.
//!
//! # Responsibilities
//! - Classify accept errors as transient or fatal
//! - Hand out backoff delays for consecutive transient failures
//! - Give up after the configured number of consecutive failures
//!
//! # Design Decisions
//! - Disabled by default: any accept error then ends the server
//! - A successful accept resets the failure count

use std::io;
use std::time::Duration;

use crate::config::AcceptConfig;
use crate::resilience::backoff::calculate_backoff;

#[cfg(unix)]
const ENOMEM: i32 = 12;
#[cfg(unix)]
const ENFILE: i32 = 23;
#[cfg(unix)]
const EMFILE: i32 = 24;

/// Whether an accept error is worth retrying.
///
/// Covers aborted handshakes and descriptor/memory exhaustion, which clear
/// up once other connections close.
pub fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) {
        return true;
    }

    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        return matches!(code, ENOMEM | ENFILE | EMFILE);
    }

    false
}

/// Tracks consecutive accept failures for one accept loop.
#[derive(Debug)]
pub struct AcceptRetry {
    config: AcceptConfig,
    failures: u32,
}

impl AcceptRetry {
    pub fn new(config: AcceptConfig) -> Self {
        Self { config, failures: 0 }
    }

    /// Reset after a successful accept.
    pub fn on_success(&mut self) {
        self.failures = 0;
    }

    /// Delay before the next accept, or `None` if the error is terminal.
    pub fn on_error(&mut self, err: &io::Error) -> Option<Duration> {
        if !self.config.retry_transient || !is_transient(err) {
            return None;
        }
        if self.failures >= self.config.max_retries {
            return None;
        }
        self.failures += 1;
        Some(calculate_backoff(
            self.failures,
            self.config.base_delay_ms,
            self.config.max_delay_ms,
        ))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aborted() -> io::Error {
        io::Error::from(io::ErrorKind::ConnectionAborted)
    }

    #[test]
    fn classifies_errors() {
        assert!(is_transient(&aborted()));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
        assert!(!is_transient(&io::Error::new(io::ErrorKind::Other, "listener closed")));
    }

    #[cfg(unix)]
    #[test]
    fn descriptor_exhaustion_is_transient() {
        assert!(is_transient(&io::Error::from_raw_os_error(EMFILE)));
        assert!(is_transient(&io::Error::from_raw_os_error(ENFILE)));
    }

    #[test]
    fn disabled_policy_never_retries() {
        let mut retry = AcceptRetry::new(AcceptConfig::default());
        assert!(retry.on_error(&aborted()).is_none());
    }

    #[test]
    fn gives_up_after_max_retries_and_resets_on_success() {
        let mut retry = AcceptRetry::new(AcceptConfig {
            retry_transient: true,
            base_delay_ms: 1,
            max_delay_ms: 4,
            max_retries: 2,
        });

        assert!(retry.on_error(&aborted()).is_some());
        assert!(retry.on_error(&aborted()).is_some());
        assert_eq!(retry.consecutive_failures(), 2);
        assert!(retry.on_error(&aborted()).is_none());

        retry.on_success();
        assert_eq!(retry.consecutive_failures(), 0);
        assert!(retry.on_error(&aborted()).is_some());
    }

    #[test]
    fn fatal_errors_are_not_retried_even_when_enabled() {
        let mut retry = AcceptRetry::new(AcceptConfig {
            retry_transient: true,
            ..AcceptConfig::default()
        });
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(retry.on_error(&err).is_none());
    }
}
