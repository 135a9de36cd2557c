use std::cell::RefCell;

use super::{Severity, TrackRecord, TrackingProvider};

/// Forwards records to the `tracing` facade under the `formular` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProvider;

impl TrackingProvider for TracingProvider {
    fn track(&self, record: &TrackRecord) {
        let source = record.source.as_str();
        let message = record.message.as_str();
        match record.severity {
            Severity::Info => tracing::info!(target: "formular", source, "{message}"),
            Severity::Warning => tracing::warn!(target: "formular", source, "{message}"),
            Severity::Error => tracing::error!(target: "formular", source, "{message}"),
            Severity::Critical => {
                tracing::error!(target: "formular", source, critical = true, "{message}")
            }
        }
    }
}

/// Writes records at or above `min_severity` to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleProvider {
    min_severity: Severity,
}

impl Default for ConsoleProvider {
    fn default() -> Self {
        Self {
            min_severity: Severity::Warning,
        }
    }
}

impl ConsoleProvider {
    pub fn new(min_severity: Severity) -> Self {
        Self { min_severity }
    }
}

impl TrackingProvider for ConsoleProvider {
    fn track(&self, record: &TrackRecord) {
        if record.severity >= self.min_severity {
            eprintln!("{record}");
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    records: RefCell<Vec<TrackRecord>>,
}

impl MemoryProvider {
    pub fn records(&self) -> Vec<TrackRecord> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.records
            .borrow()
            .iter()
            .filter(|record| record.severity == severity)
            .count()
    }

    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|record| record.severity == severity && record.message.contains(needle))
    }
}

impl TrackingProvider for MemoryProvider {
    fn track(&self, record: &TrackRecord) {
        self.records.borrow_mut().push(record.clone());
    }
}
