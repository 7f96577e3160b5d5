//! Event predicates used by the filtering and auto-flush wrappers
//!
//! The pipeline never interprets event fields itself beyond the level;
//! policies receive their decision logic as caller-supplied conditions.

use super::log_event::LogEvent;
use super::log_level::LogLevel;
use std::sync::Arc;

/// Boolean predicate over a log event.
pub type Condition = Arc<dyn Fn(&LogEvent) -> bool + Send + Sync>;

/// Condition matching events at or above `level`.
pub fn level_at_least(level: LogLevel) -> Condition {
    Arc::new(move |event| event.level >= level)
}

/// Condition matching every event.
pub fn always() -> Condition {
    Arc::new(|_| true)
}

/// Condition matching events whose logger name equals `logger`.
pub fn logger_equals(logger: impl Into<String>) -> Condition {
    let logger = logger.into();
    Arc::new(move |event| event.logger == logger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_at_least() {
        let condition = level_at_least(LogLevel::Warn);
        assert!(!condition(&LogEvent::new(LogLevel::Info, "quiet")));
        assert!(condition(&LogEvent::new(LogLevel::Error, "loud")));
    }

    #[test]
    fn test_logger_equals() {
        let condition = logger_equals("app.db");
        assert!(condition(&LogEvent::new(LogLevel::Info, "x").with_logger("app.db")));
        assert!(!condition(&LogEvent::new(LogLevel::Info, "x").with_logger("app.http")));
    }
}
