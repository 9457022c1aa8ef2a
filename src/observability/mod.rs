//! Observability subsystem
//!
//! Structured JSON logging on stderr, gated by the `--debug`/`--verbose`
//! level. Observability is read-only: it never alters query output.
//!
//! # Usage
//!
//! ```ignore
//! use jqpar::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::PlanSelected, &[("mode", "parallel-filter")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Severity an event is logged at unless the caller overrides it.
fn default_severity(event: Event) -> Severity {
    if event.is_fatal() {
        Severity::Fatal
    } else if event.is_degraded() {
        Severity::Warn
    } else {
        match event {
            Event::PartitionDispatched
            | Event::PartitionComplete
            | Event::PartitionFlushed => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(default_severity(event), event.as_str(), fields);
}

/// Configure the logger from a debug level (0, 1 or 2).
pub fn init(debug_level: u8) {
    Logger::set_threshold(Severity::threshold_for_debug_level(debug_level));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_severities() {
        assert_eq!(default_severity(Event::EvaluatorMissing), Severity::Fatal);
        assert_eq!(default_severity(Event::PartitionFailed), Severity::Warn);
        assert_eq!(default_severity(Event::PlanSelected), Severity::Info);
        assert_eq!(default_severity(Event::PartitionDispatched), Severity::Trace);
    }

    #[test]
    fn test_log_event() {
        // This just verifies no panic
        log_event_with_fields(Event::RunComplete, &[]);
        log_event_with_fields(Event::PlanSelected, &[("mode", "sequential")]);
    }
}
