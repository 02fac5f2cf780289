//! Logging and performance-logging sinks
//!
//! Sinks are declared in the harness settings. This module describes them,
//! renders their `%(name)s` templates, and can install them as a
//! `tracing` subscriber.

mod format;
mod sink;
mod subscriber;

pub use format::{FormatTemplate, LogRecord, ASCTIME_FORMAT};
pub use sink::{LogLevel, LoggingConfig, LoggingSink, SinkKind, StreamName};
pub use subscriber::{install, layers, sink_layer, FilelogWriter, SinkLayer, TemplateFormat};
