use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use crate::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

/// Logger that stores every line in memory.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.messages(Level::Info)
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages(Level::Error)
    }

    /// Number of error lines containing `needle`.
    pub fn errors_containing(&self, needle: &str) -> usize {
        self.count(Level::Error, needle)
    }

    /// Number of info lines containing `needle`.
    pub fn infos_containing(&self, needle: &str) -> usize {
        self.count(Level::Info, needle)
    }

    fn messages(&self, level: Level) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.clone())
            .collect()
    }

    fn count(&self, level: Level, needle: &str) -> usize {
        self.lock()
            .iter()
            .filter(|r| r.level == level && r.message.contains(needle))
            .count()
    }

    fn push(&self, level: Level, args: fmt::Arguments<'_>) {
        self.lock().push(LogRecord {
            level,
            message: args.to_string(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogRecord>> {
        // A panicking handler never holds this lock, but don't lose records if one did.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Logger for RecordingLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        self.push(Level::Info, args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.push(Level::Error, args);
    }
}
