use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    Info,
    Matched,
    RowSkipped,
    UnrecognizedGrade,
    NoMatchFound,
    DuplicateSuppressed,
}

impl LogKind {
    fn tag(&self) -> &'static str {
        match self {
            LogKind::Info => "info",
            LogKind::Matched => "matched",
            LogKind::RowSkipped => "skipped",
            LogKind::UnrecognizedGrade => "unrecognized-grade",
            LogKind::NoMatchFound => "no-match",
            LogKind::DuplicateSuppressed => "duplicate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: LogKind,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.tag(), self.message)
    }
}

/// Append-only trace of every decision taken during a run, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingLog {
    entries: Vec<LogEntry>,
}

impl ProcessingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: LogKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            LogKind::Info | LogKind::Matched => tracing::debug!("{message}"),
            LogKind::DuplicateSuppressed => tracing::info!("{message}"),
            _ => tracing::warn!("{message}"),
        }
        self.entries.push(LogEntry { kind, message });
    }

    pub fn extend(&mut self, other: ProcessingLog) {
        self.entries.extend(other.entries);
    }

    pub fn count(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|entry| entry.kind == kind).count()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    pub fn render(&self) -> String {
        self.lines().join("\n")
    }
}
