//! `%(name)s` message templates
//!
//! Templates are parsed once into literal and field segments. Rendering
//! substitutes fields from a [`LogRecord`]; unknown fields render empty and
//! `%%` renders a single `%`.

use super::sink::LogLevel;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;

/// Timestamp layout used for `%(asctime)s`
pub const ASCTIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One record handed to a sink
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Additional named fields (`check_info`, `check_system`, ...)
    pub fields: BTreeMap<String, String>,
    /// Creation time
    pub time: DateTime<Local>,
}

impl LogRecord {
    /// Record stamped with the current time
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: BTreeMap::new(),
            time: Local::now(),
        }
    }

    /// Attach a named field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Value for a template field
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "message" => Some(self.message.clone()),
            "levelname" => Some(self.level.name().to_string()),
            "asctime" => Some(self.time.format(ASCTIME_FORMAT).to_string()),
            other => self.fields.get(other).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed message template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatTemplate {
    segments: Vec<Segment>,
}

impl FormatTemplate {
    /// Parse a template
    ///
    /// A `%(` without a closing `)s` is kept as literal text.
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(pos) = rest.find('%') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if let Some(after) = tail.strip_prefix("%%") {
                literal.push('%');
                rest = after;
            } else if let Some((name, after)) = tail
                .strip_prefix("%(")
                .and_then(|t| t.split_once(")s"))
                .filter(|(name, _)| !name.contains(['(', ')', '%']))
            {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(name.to_string()));
                rest = after;
            } else {
                literal.push('%');
                rest = &tail[1..];
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    /// Names of the fields the template references
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Render a record
    pub fn render(&self, record: &LogRecord) -> String {
        self.render_with(|name| record.field(name))
    }

    /// Render with an arbitrary field lookup
    pub fn render_with<F>(&self, mut lookup: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    if let Some(value) = lookup(name) {
                        out.push_str(&value);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_known_fields() {
        let template = FormatTemplate::parse("%(levelname)s: %(check_info)s: %(message)s");
        let record = LogRecord::new(LogLevel::Info, "build started")
            .with_field("check_info", "ArborGpuTest on daint:gpu using PrgEnv-gnu");
        assert_eq!(
            template.render(&record),
            "INFO: ArborGpuTest on daint:gpu using PrgEnv-gnu: build started"
        );
    }

    #[test]
    fn test_unknown_field_renders_empty() {
        let template = FormatTemplate::parse("jobid=%(check_jobid)s|%(message)s");
        let record = LogRecord::new(LogLevel::Debug, "done");
        assert_eq!(template.render(&record), "jobid=|done");
    }

    #[test]
    fn test_literal_percent_and_malformed() {
        let template = FormatTemplate::parse("100%% %(message)s %(broken");
        let record = LogRecord::new(LogLevel::Info, "ok");
        assert_eq!(template.render(&record), "100% ok %(broken");
    }

    #[test]
    fn test_fields_listing() {
        let template = FormatTemplate::parse("%(check_system)s/%(check_partition)s");
        let fields: Vec<&str> = template.fields().collect();
        assert_eq!(fields, vec!["check_system", "check_partition"]);
    }

    #[test]
    fn test_asctime_layout() {
        let record = LogRecord::new(LogLevel::Info, "x");
        let rendered = FormatTemplate::parse("[%(asctime)s]").render(&record);
        // [YYYY-MM-DDTHH:MM:SS]
        assert_eq!(rendered.len(), 21);
        assert!(rendered.starts_with('[') && rendered.ends_with(']'));
    }
}
