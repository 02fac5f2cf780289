//! Log and performance-log sink descriptors

use crate::error::{CiConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

/// Record severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Normal progress
    Info,
    /// Something unexpected but recoverable
    Warning,
    /// A failed operation
    Error,
    /// The run cannot continue
    Critical,
}

impl LogLevel {
    /// Upper-case name, as rendered by `%(levelname)s`
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogLevel {
    type Err = CiConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(CiConfigError::UnknownLogLevel(s.to_string())),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

// `tracing` has nothing above ERROR, so a CRITICAL floor admits no event.
impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Critical => LevelFilter::OFF,
        }
    }
}

/// Standard stream a stream sink writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    /// Standard output
    #[default]
    Stdout,
    /// Standard error
    Stderr,
}

/// Destination of a sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkKind {
    /// A single log file
    File {
        /// File path, relative paths resolve against the log directory
        name: PathBuf,
        /// Keep existing content instead of truncating
        #[serde(default)]
        append: bool,
    },
    /// Standard output or error
    Stream {
        /// Which stream
        #[serde(default)]
        name: StreamName,
    },
    /// One file per check, under a directory derived from the record
    Filelog {
        /// Directory template, e.g. `%(check_system)s/%(check_partition)s`
        prefix: String,
        /// Keep existing content instead of truncating
        #[serde(default)]
        append: bool,
    },
    /// A Graylog server
    Graylog {
        /// Server host
        host: String,
        /// Server port
        port: u16,
        /// Extra fields attached to every record
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extras: BTreeMap<String, String>,
    },
}

/// One configured output handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSink {
    /// Destination
    #[serde(flatten)]
    pub kind: SinkKind,
    /// Lowest level written
    pub level: LogLevel,
    /// Message format template
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "%(message)s".to_string()
}

impl LoggingSink {
    /// File sink
    pub fn file(name: impl Into<PathBuf>, level: LogLevel, format: impl Into<String>, append: bool) -> Self {
        Self {
            kind: SinkKind::File {
                name: name.into(),
                append,
            },
            level,
            format: format.into(),
        }
    }

    /// Stream sink
    pub fn stream(name: StreamName, level: LogLevel, format: impl Into<String>) -> Self {
        Self {
            kind: SinkKind::Stream { name },
            level,
            format: format.into(),
        }
    }

    /// Per-check file sink
    pub fn filelog(prefix: impl Into<String>, level: LogLevel, format: impl Into<String>, append: bool) -> Self {
        Self {
            kind: SinkKind::Filelog {
                prefix: prefix.into(),
                append,
            },
            level,
            format: format.into(),
        }
    }

    /// Whether a record of `level` passes this sink's floor
    pub fn accepts(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    /// Append flag for file-backed sinks
    pub fn append(&self) -> Option<bool> {
        match &self.kind {
            SinkKind::File { append, .. } | SinkKind::Filelog { append, .. } => Some(*append),
            SinkKind::Stream { .. } | SinkKind::Graylog { .. } => None,
        }
    }

    /// Short label used in listings
    pub fn describe(&self) -> String {
        match &self.kind {
            SinkKind::File { name, .. } => format!("file {}", name.display()),
            SinkKind::Stream { name } => format!("stream {:?}", name).to_lowercase(),
            SinkKind::Filelog { prefix, .. } => format!("filelog {}", prefix),
            SinkKind::Graylog { host, port, .. } => format!("graylog {}:{}", host, port),
        }
    }
}

/// A logger: a root level plus its sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level gating every sink
    pub level: LogLevel,
    /// Output handlers
    pub handlers: Vec<LoggingSink>,
}

impl LoggingConfig {
    /// Whether a sink of this logger writes a record of `level`
    pub fn sink_accepts(&self, sink: &LoggingSink, level: LogLevel) -> bool {
        level >= self.level && sink.accepts(level)
    }

    /// Sinks that write a record of `level`
    pub fn sinks_for(&self, level: LogLevel) -> impl Iterator<Item = &LoggingSink> {
        self.handlers
            .iter()
            .filter(move |sink| self.sink_accepts(sink, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Error < LogLevel::Critical);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_sink_floor() {
        let debug = LoggingSink::stream(StreamName::Stdout, LogLevel::Debug, "%(message)s");
        assert!(debug.accepts(LogLevel::Info));
        assert!(debug.accepts(LogLevel::Debug));

        let info = LoggingSink::stream(StreamName::Stdout, LogLevel::Info, "%(message)s");
        assert!(!info.accepts(LogLevel::Debug));
        assert!(info.accepts(LogLevel::Error));
    }

    #[test]
    fn test_root_level_gates_sinks() {
        let config = LoggingConfig {
            level: LogLevel::Info,
            handlers: vec![LoggingSink::file("reframe.log", LogLevel::Debug, "%(message)s", false)],
        };
        assert_eq!(config.sinks_for(LogLevel::Debug).count(), 0);
        assert_eq!(config.sinks_for(LogLevel::Info).count(), 1);
    }

    #[test]
    fn test_handler_json_shape() {
        let sink: LoggingSink = serde_json::from_str(
            r#"{"type": "file", "name": "reframe.out", "level": "INFO", "format": "%(message)s", "append": false}"#,
        )
        .unwrap();
        assert_eq!(sink.append(), Some(false));
        assert_eq!(sink.level, LogLevel::Info);

        let sink: LoggingSink =
            serde_json::from_str(r#"{"type": "stream", "name": "stdout", "level": "INFO"}"#).unwrap();
        assert_eq!(sink.kind, SinkKind::Stream { name: StreamName::Stdout });
        assert_eq!(sink.format, "%(message)s");
        assert_eq!(sink.append(), None);
        assert_eq!(sink.describe(), "stream stdout");
    }

    #[test]
    fn test_level_filter_conversion() {
        assert_eq!(LevelFilter::from(LogLevel::Error), LevelFilter::ERROR);
        assert_eq!(LevelFilter::from(LogLevel::Critical), LevelFilter::OFF);
        assert_eq!(LogLevel::from(tracing::Level::TRACE), LogLevel::Debug);
    }
}
