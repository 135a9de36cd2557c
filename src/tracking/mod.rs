//! Internal diagnostics.
//!
//! A [`Tracker`] fans records out to pluggable [`TrackingProvider`] sinks. It
//! is never part of the functional path: nothing reads tracker output back.

mod providers;

use std::fmt;
use std::rc::Rc;

pub use providers::{ConsoleProvider, MemoryProvider, TracingProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    pub severity: Severity,
    pub source: String,
    pub message: String,
}

impl fmt::Display for TrackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.source, self.message)
    }
}

pub trait TrackingProvider: fmt::Debug {
    fn track(&self, record: &TrackRecord);
}

#[derive(Debug, Clone)]
pub struct Tracker {
    providers: Vec<Rc<dyn TrackingProvider>>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new().with_provider(Rc::new(TracingProvider))
    }
}

impl Tracker {
    /// A tracker with no providers; records are dropped.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: Rc<dyn TrackingProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn add_provider(&mut self, provider: Rc<dyn TrackingProvider>) {
        self.providers.push(provider);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn track(&self, severity: Severity, source: &str, message: impl Into<String>) {
        if self.providers.is_empty() {
            return;
        }
        let record = TrackRecord {
            severity,
            source: source.to_string(),
            message: message.into(),
        };
        for provider in &self.providers {
            provider.track(&record);
        }
    }

    pub fn internal_info(&self, source: &str, message: impl Into<String>) {
        self.track(Severity::Info, source, message);
    }

    pub fn internal_warning(&self, source: &str, message: impl Into<String>) {
        self.track(Severity::Warning, source, message);
    }

    pub fn internal_error(&self, source: &str, message: impl Into<String>) {
        self.track(Severity::Error, source, message);
    }

    pub fn internal_critical(&self, source: &str, message: impl Into<String>) {
        self.track(Severity::Critical, source, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_reach_every_provider() {
        let first = Rc::new(MemoryProvider::default());
        let second = Rc::new(MemoryProvider::default());
        let tracker = Tracker::new()
            .with_provider(first.clone())
            .with_provider(second.clone());

        tracker.internal_warning("field:email", "option not found");
        tracker.internal_critical("form", "boom");

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(first.records()[0].severity, Severity::Warning);
        assert!(second.contains(Severity::Critical, "boom"));
    }

    #[test]
    fn tracker_without_providers_is_silent() {
        let tracker = Tracker::new();
        tracker.internal_error("x", "dropped");
        assert_eq!(tracker.provider_count(), 0);
    }
}
