//! Logger seam
//!
//! TigerStyle: Logging is injected, never looked up globally by name.
//!
//! Activators ask a [`LoggerProvider`] for a [`Logger`] when they need to
//! report an outcome. A provider is an ordinary dependency-injection handle;
//! when none is set, or the one that was set has been dropped, the anonymous
//! logger is used.

use crate::outcome::SingleOutcome;
use std::fmt;
use std::sync::Arc;

const ANONYMOUS_LOGGER_NAME: &str = "anonymous";

/// Log level derived from an outcome severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Not logged at all
    Off,
    /// Informational
    Info,
    /// Non-fatal concern
    Warning,
    /// Failure of any kind
    Severe,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Off => write!(f, "off"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Severe => write!(f, "severe"),
        }
    }
}

/// Sink receiving the single outcomes emitted by [`crate::Outcome::log_on`]
pub trait OutcomeLog {
    /// Record one single outcome at the given level
    fn record(&self, level: LogLevel, outcome: &SingleOutcome);
}

/// Named logger emitting `tracing` events
#[derive(Debug, Clone)]
pub struct Logger {
    name: Arc<str>,
}

impl Logger {
    /// Create a logger with the given name
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "logger name must not be empty");
        Self { name }
    }

    /// The default logger used when no provider is available
    pub fn anonymous() -> Self {
        Self::named(ANONYMOUS_LOGGER_NAME)
    }

    /// Logger name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl OutcomeLog for Logger {
    fn record(&self, level: LogLevel, outcome: &SingleOutcome) {
        let message = outcome.message().unwrap_or("");
        match level {
            LogLevel::Off => {}
            LogLevel::Info => tracing::info!(
                logger = %self.name,
                provider = %outcome.provider(),
                code = outcome.code(),
                severity = %outcome.severity(),
                "{}",
                message
            ),
            LogLevel::Warning => tracing::warn!(
                logger = %self.name,
                provider = %outcome.provider(),
                code = outcome.code(),
                severity = %outcome.severity(),
                "{}",
                message
            ),
            LogLevel::Severe => tracing::error!(
                logger = %self.name,
                provider = %outcome.provider(),
                code = outcome.code(),
                severity = %outcome.severity(),
                fault = ?outcome.fault(),
                "{}",
                message
            ),
        }
    }
}

/// Supplies a logger on demand
pub trait LoggerProvider: Send + Sync {
    /// The logger to report through
    fn logger(&self) -> Logger;
}

impl LoggerProvider for Logger {
    fn logger(&self) -> Logger {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Severity;

    #[test]
    fn test_anonymous_logger_name() {
        assert_eq!(Logger::anonymous().name(), "anonymous");
        assert_eq!(Logger::default().name(), "anonymous");
    }

    #[test]
    fn test_logger_is_its_own_provider() {
        let logger = Logger::named("kernel");
        assert_eq!(logger.logger().name(), "kernel");
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(LogLevel::Off < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Severe);
    }

    #[test]
    fn test_record_does_not_panic_without_subscriber() {
        let logger = Logger::named("kernel");
        let outcome = SingleOutcome::new(Severity::Error, "agent-1", -2).with_fault("boom");
        logger.record(LogLevel::Severe, &outcome);
        logger.record(LogLevel::Off, &outcome);
    }
}
