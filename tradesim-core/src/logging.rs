//! Injected log sink.
//!
//! The engine never writes to the console or to files. Every component takes
//! an `Arc<dyn LogSink>` and reports `(severity, category, message)` triples
//! through it. `LogFacade` forwards to the `log` crate so that the host binary
//! decides where the lines end up; `MemoryLog` keeps them for assertions.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::sync::lock;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    fn level(self) -> log::Level {
        match self {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

/// Destination for engine log lines.
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, category: &str, message: &str);

    fn debug(&self, category: &str, message: &str) {
        self.log(Severity::Debug, category, message);
    }

    fn info(&self, category: &str, message: &str) {
        self.log(Severity::Info, category, message);
    }

    fn warning(&self, category: &str, message: &str) {
        self.log(Severity::Warning, category, message);
    }

    fn error(&self, category: &str, message: &str) {
        self.log(Severity::Error, category, message);
    }
}

/// Forwards entries to the `log` facade, using the category as the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacade;

impl LogSink for LogFacade {
    fn log(&self, severity: Severity, category: &str, message: &str) {
        log::log!(target: category, severity.level(), "{message}");
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl LogSink for NullLog {
    fn log(&self, _severity: Severity, _category: &str, _message: &str) {}
}

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub category: String,
    pub message: String,
}

/// Captures entries in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).clone()
    }

    /// Entries at or above `severity`.
    pub fn at_least(&self, severity: Severity) -> Vec<LogEntry> {
        lock(&self.entries)
            .iter()
            .filter(|e| e.severity >= severity)
            .cloned()
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        lock(&self.entries).iter().any(|e| e.message.contains(needle))
    }
}

impl LogSink for MemoryLog {
    fn log(&self, severity: Severity, category: &str, message: &str) {
        lock(&self.entries).push(LogEntry {
            severity,
            category: category.to_string(),
            message: message.to_string(),
        });
    }
}
