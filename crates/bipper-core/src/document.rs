//! Countdown documents: the ordered list of sections to play.
//!
//! A document is read from TOML, YAML or JSON:
//!
//! ```toml
//! loop = false
//!
//! [[sections]]
//! name = "warmup"
//! duration = "5m"
//!
//! [[sections]]
//! name = "burpees"
//! duration = 45
//! ```
//!
//! Durations are either a number of seconds or a string made of `h`, `m`
//! and `s` components (`"90"`, `"45s"`, `"1m30s"`, `"1h"`).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ConfigError, DocumentLoadError};

/// A named, timed interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

impl Section {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }

    /// Number of one-second ticks the section lasts. Partial seconds round up.
    pub fn ticks(&self) -> u64 {
        let secs = self.duration.as_secs();
        if self.duration.subsec_nanos() > 0 {
            secs.saturating_add(1)
        } else {
            secs
        }
    }
}

/// An immutable, parsed countdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    #[serde(rename = "loop")]
    looping: bool,
    sections: Vec<Section>,
    #[serde(skip)]
    total: Duration,
    /// Text the document was parsed from, if it came from a loader.
    #[serde(skip)]
    raw: Option<String>,
}

impl Document {
    /// Build a document in code. `total` is derived from the sections.
    pub fn new(looping: bool, sections: Vec<Section>) -> Self {
        // Saturates; `validate` rejects documents whose total overflows.
        let total = sections
            .iter()
            .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration));
        Self {
            looping,
            sections,
            total,
            raw: None,
        }
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Sum of the sections' tick counts.
    pub fn total_ticks(&self) -> u64 {
        self.sections
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.ticks()))
    }

    /// Check that the document can be played.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoSections`] for an empty document and
    /// [`ConfigError::ZeroDuration`] for a section that would never tick and
    /// [`ConfigError::TotalOverflow`] when the sections cannot be summed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sections.is_empty() {
            return Err(ConfigError::NoSections);
        }
        if let Some(section) = self.sections.iter().find(|s| s.ticks() == 0) {
            return Err(ConfigError::ZeroDuration {
                name: section.name.clone(),
            });
        }
        let overflow = self
            .sections
            .iter()
            .try_fold((Duration::ZERO, 0u64), |(total, ticks), s| {
                Some((total.checked_add(s.duration)?, ticks.checked_add(s.ticks())?))
            })
            .is_none();
        if overflow {
            return Err(ConfigError::TotalOverflow);
        }
        Ok(())
    }

    /// The serialized form observers are shown.
    ///
    /// This is the original text when the document was loaded, or a TOML
    /// rendering for documents built in code.
    pub fn raw_text(&self) -> String {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => toml::to_string_pretty(self).unwrap_or_else(|e| {
                tracing::warn!("failed to render document as TOML: {e}");
                String::new()
            }),
        }
    }
}

/// Serialized document formats understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Pick a format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, DocumentLoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "" => Err(DocumentLoadError::UnsupportedFormat(format!(
                "{} has no extension",
                path.display()
            ))),
            other => Err(DocumentLoadError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(rename = "loop", default)]
    looping: bool,
    #[serde(default)]
    sections: Vec<RawSection>,
}

#[derive(Deserialize)]
struct RawSection {
    name: String,
    duration: RawDuration,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn resolve(self) -> Result<Duration, DocumentLoadError> {
        match self {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(text) => parse_duration(&text),
        }
    }
}

/// Read and parse the document at `path`. The format follows the extension.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is malformed, or describes
/// a document that cannot be played.
pub fn load(path: impl AsRef<Path>) -> Result<Document, DocumentLoadError> {
    let path = path.as_ref();
    let format = DocumentFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path).map_err(|source| DocumentLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = parse(&raw, format)?;
    tracing::debug!(
        path = %path.display(),
        sections = doc.sections().len(),
        total_secs = doc.total().as_secs(),
        "loaded document"
    );
    Ok(doc)
}

/// Parse a document from text, keeping the text for display.
///
/// # Errors
///
/// Returns an error if the text is malformed or the document is not playable.
pub fn parse(raw: &str, format: DocumentFormat) -> Result<Document, DocumentLoadError> {
    let parsed: RawDocument = match format {
        DocumentFormat::Toml => toml::from_str(raw)?,
        DocumentFormat::Yaml => serde_yaml::from_str(raw)?,
        DocumentFormat::Json => serde_json::from_str(raw)?,
    };

    let sections = parsed
        .sections
        .into_iter()
        .map(|s| Ok(Section::new(s.name, s.duration.resolve()?)))
        .collect::<Result<Vec<_>, DocumentLoadError>>()?;

    let mut doc = Document::new(parsed.looping, sections);
    doc.validate()?;
    doc.raw = Some(raw.to_string());
    Ok(doc)
}

/// Parse `"90"`, `"45s"`, `"1m30s"` or `"1h"` into a duration.
pub fn parse_duration(text: &str) -> Result<Duration, DocumentLoadError> {
    let invalid = |reason: &str| DocumentLoadError::InvalidDuration {
        value: text.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut last_unit = u64::MAX;
    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid("expected h, m or s")),
        };
        if digits.is_empty() {
            return Err(invalid("unit without a number"));
        }
        if unit >= last_unit {
            return Err(invalid("units must go from hours to seconds"));
        }
        let value: u64 = digits.parse().map_err(|_| invalid("number too large"))?;
        total = value
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| invalid("number too large"))?;
        digits.clear();
        last_unit = unit;
    }
    if !digits.is_empty() {
        return Err(invalid("trailing number without a unit"));
    }
    Ok(Duration::from_secs(total))
}

/// Render a duration the way [`parse_duration`] reads it.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return "0s".into();
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 {
        out.push_str(&format!("{s}s"));
    }
    out
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_duration(*d))
}
