//! Turning sink descriptors into live outputs
//!
//! File and stream sinks become `tracing-subscriber` layers, each filtered at
//! its own floor and formatting events through its template. Filelog sinks
//! are written per record by [`FilelogWriter`], since their path depends on
//! the record. Graylog sinks are reported and skipped.

use super::format::{FormatTemplate, LogRecord};
use super::sink::{LogLevel, LoggingConfig, LoggingSink, SinkKind, StreamName};
use crate::error::{CiConfigError, IoResultExt, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, Registry};

/// Boxed layer over the plain registry
pub type SinkLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: BTreeMap<String, String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}

/// Event formatter driven by a `%(name)s` template
pub struct TemplateFormat {
    template: FormatTemplate,
}

impl TemplateFormat {
    /// Create from template text
    pub fn new(template: &str) -> Self {
        Self {
            template: FormatTemplate::parse(template),
        }
    }
}

impl<S, N> FormatEvent<S, N> for TemplateFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let mut record = LogRecord::new(LogLevel::from(*event.metadata().level()), collector.message);
        record.fields = collector.fields;
        writeln!(writer, "{}", self.template.render(&record))
    }
}

fn open_log_file(path: &Path, append: bool) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_path(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .with_path(path)
}

/// Build a layer for one sink, or `None` for sinks that are not layers
pub fn sink_layer(root: LogLevel, sink: &LoggingSink, log_dir: &Path) -> Result<Option<SinkLayer>> {
    let floor = LevelFilter::from(root.max(sink.level));
    let format = TemplateFormat::new(&sink.format);

    let layer: SinkLayer = match &sink.kind {
        SinkKind::File { name, append } => {
            let file = open_log_file(&log_dir.join(name), *append)?;
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(format)
                .with_writer(Mutex::new(file))
                .with_filter(floor)
                .boxed()
        }
        SinkKind::Stream { name: StreamName::Stdout } => tracing_subscriber::fmt::layer()
            .event_format(format)
            .with_writer(std::io::stdout)
            .with_filter(floor)
            .boxed(),
        SinkKind::Stream { name: StreamName::Stderr } => tracing_subscriber::fmt::layer()
            .event_format(format)
            .with_writer(std::io::stderr)
            .with_filter(floor)
            .boxed(),
        SinkKind::Filelog { .. } => return Ok(None),
        SinkKind::Graylog { host, port, .. } => {
            tracing::warn!(host = %host, port = *port, "graylog sinks are not supported, skipping");
            return Ok(None);
        }
    };

    Ok(Some(layer))
}

/// Build layers for every file and stream sink of a logger
pub fn layers(config: &LoggingConfig, log_dir: &Path) -> Result<Vec<SinkLayer>> {
    let mut out = Vec::new();
    for sink in &config.handlers {
        if let Some(layer) = sink_layer(config.level, sink, log_dir)? {
            out.push(layer);
        }
    }
    Ok(out)
}

/// Install a logger as the global default subscriber
pub fn install(config: &LoggingConfig, log_dir: &Path) -> Result<()> {
    let subscriber = Registry::default().with(layers(config, log_dir)?);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| CiConfigError::Logging(e.to_string()))
}

/// Writes performance records to per-check files
///
/// The directory comes from the sink's prefix template, rendered against the
/// record; the file is `<check_name>.log` inside it. Non-append sinks
/// truncate each file the first time it is written in this process.
pub struct FilelogWriter {
    base: PathBuf,
    prefix: FormatTemplate,
    template: FormatTemplate,
    level: LogLevel,
    append: bool,
    opened: Mutex<Vec<PathBuf>>,
}

impl FilelogWriter {
    /// Create a writer for a filelog sink, rooted at `base`
    pub fn new(base: impl Into<PathBuf>, sink: &LoggingSink) -> Result<Self> {
        match &sink.kind {
            SinkKind::Filelog { prefix, append } => Ok(Self {
                base: base.into(),
                prefix: FormatTemplate::parse(prefix),
                template: FormatTemplate::parse(&sink.format),
                level: sink.level,
                append: *append,
                opened: Mutex::new(Vec::new()),
            }),
            _ => Err(CiConfigError::Logging(format!(
                "{} is not a filelog sink",
                sink.describe()
            ))),
        }
    }

    /// File a record would be written to
    pub fn path_for(&self, record: &LogRecord) -> PathBuf {
        let dir = self.prefix.render(record);
        let check = record
            .fields
            .get("check_name")
            .map(String::as_str)
            .unwrap_or("check");
        self.base.join(dir).join(format!("{}.log", check))
    }

    /// Write a record; returns `false` when it is below the sink's floor
    pub fn write(&self, record: &LogRecord) -> Result<bool> {
        if record.level < self.level {
            return Ok(false);
        }

        let path = self.path_for(record);
        let append = {
            let mut opened = self
                .opened
                .lock()
                .map_err(|_| CiConfigError::Logging("filelog state poisoned".into()))?;
            if opened.contains(&path) {
                true
            } else {
                opened.push(path.clone());
                self.append
            }
        };

        let mut file = open_log_file(&path, append)?;
        writeln!(file, "{}", self.template.render(record)).with_path(&path)?;
        Ok(true)
    }
}
