use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NoticeLevel::Info => "INFO",
            NoticeLevel::Warn => "WARNING",
            NoticeLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One message for the shell's log surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)
    }
}

/// Receiver for notices. Implemented by whatever renders the log area.
pub trait EventSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Keeps the most recent notices, dropping the oldest once full.
#[derive(Debug)]
pub struct NoticeLog {
    capacity: usize,
    entries: Mutex<VecDeque<Notice>>,
}

impl NoticeLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Snapshot of the retained notices, oldest first.
    pub fn recent(&self) -> Vec<Notice> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

impl EventSink for NoticeLog {
    fn notify(&self, notice: Notice) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push_back(notice);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }
}

/// Cloneable handle that reports notices to `tracing` and to a sink.
#[derive(Clone)]
pub struct Notifier {
    sink: Option<Arc<dyn EventSink>>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Notifier that only logs through `tracing`.
    pub fn tracing_only() -> Self {
        Self { sink: None }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Error, message.into());
    }

    pub fn emit(&self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Info => tracing::info!("{message}"),
            NoticeLevel::Warn => tracing::warn!("{message}"),
            NoticeLevel::Error => tracing::error!("{message}"),
        }
        if let Some(sink) = &self.sink {
            sink.notify(Notice { level, message });
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::tracing_only()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
