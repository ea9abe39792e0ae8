//! Log sinks: where every verdict ends up as one human-readable line.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            level,
            message: message.into(),
        }
    }

    /// `YYYY-MM-DD HH:MM:SS - message`
    pub fn render(&self) -> String {
        let stamp = self
            .timestamp
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
            .unwrap_or_else(|_| self.timestamp.unix_timestamp().to_string());
        format!("{stamp} - {}", self.message)
    }
}

pub trait LogSink: Send + Sync {
    fn write(&self, line: &LogLine);
}

/// Forwards lines to `tracing` under the `watchtower::events` target.
pub struct TracingLog;

impl LogSink for TracingLog {
    fn write(&self, line: &LogLine) {
        match line.level {
            LogLevel::Info => tracing::info!(target: "watchtower::events", "{}", line.message),
            LogLevel::Warn => tracing::warn!(target: "watchtower::events", "{}", line.message),
            LogLevel::Error => tracing::error!(target: "watchtower::events", "{}", line.message),
        }
    }
}

/// Appends rendered lines to a plain text file.
pub struct FileLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLog {
    // Blocking append under a short lock; one line per transition is cheap enough.
    fn write(&self, line: &LogLine) {
        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", line.render()) {
            tracing::warn!(path = %self.path.display(), error = %e, "cannot append to log file");
        }
    }
}

/// Bounded in-memory feed of recent lines, served to observers.
pub struct ActivityFeed {
    capacity: usize,
    lines: Mutex<VecDeque<LogLine>>,
}

impl ActivityFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::new()),
        }
    }

    /// Up to `limit` most recent lines, oldest first.
    pub fn entries(&self, limit: usize) -> Vec<LogLine> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(limit);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl LogSink for ActivityFeed {
    fn write(&self, line: &LogLine) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_render_format() {
        let line = LogLine {
            timestamp: datetime!(2024-03-09 07:05:01 UTC),
            level: LogLevel::Warn,
            message: "NAS (10.0.0.5) is now OFFLINE".into(),
        };
        assert_eq!(line.render(), "2024-03-09 07:05:01 - NAS (10.0.0.5) is now OFFLINE");
    }

    #[test]
    fn test_file_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("network_monitor.log");
        let log = FileLog::open(&path).unwrap();

        log.write(&LogLine::now(LogLevel::Info, "first"));
        log.write(&LogLine::now(LogLevel::Error, "second"));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - first"));
        assert!(lines[1].ends_with(" - second"));
    }

    #[test]
    fn test_activity_feed_is_bounded() {
        let feed = ActivityFeed::new(3);
        for i in 0..5 {
            feed.write(&LogLine::now(LogLevel::Info, format!("line {i}")));
        }
        assert_eq!(feed.len(), 3);
        let messages: Vec<String> = feed.entries(10).into_iter().map(|l| l.message).collect();
        assert_eq!(messages, vec!["line 2", "line 3", "line 4"]);
        assert_eq!(feed.entries(1)[0].message, "line 4");
    }
}
