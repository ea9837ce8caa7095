//! Core domain types for reportcast runs and report documents.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Markdown heading depth used for section headings and chunk boundaries.
pub const SECTION_HEADING_DEPTH: usize = 3;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// SourceStatus / SourceResult
// ---------------------------------------------------------------------------

/// Outcome classification for one connector invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Warning,
    Error,
}

impl SourceStatus {
    /// Stable string form used in logs and storage rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Whether this status represents a degraded (warning/error) result.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A preformatted markdown section produced by a connector.
#[derive(Debug, Clone)]
pub struct TextSection {
    /// Section title (without the leading `###`).
    pub heading: String,
    /// Status tag carried into the rendered heading.
    pub status: SourceStatus,
    /// Markdown body below the heading line.
    pub body: String,
}

/// What one connector invocation yields. Exactly one per fetch, always.
#[derive(Debug, Clone)]
pub enum SourceResult {
    /// A ready-to-assemble markdown section.
    Text(TextSection),
    /// Raw upstream records handed to the normalizer.
    Records(Vec<serde_json::Value>),
}

impl SourceResult {
    /// Build an error-tagged text section (connectors fail closed with this).
    pub fn error(heading: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Text(TextSection {
            heading: heading.into(),
            status: SourceStatus::Error,
            body: format!("- {}", detail.into()),
        })
    }

    /// Build a warning-tagged text section (missing config, empty data).
    pub fn warning(heading: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Text(TextSection {
            heading: heading.into(),
            status: SourceStatus::Warning,
            body: format!("- {}", detail.into()),
        })
    }
}

// ---------------------------------------------------------------------------
// Section / ReportDocument
// ---------------------------------------------------------------------------

/// One section of the composite report. Order of sections is insertion
/// order and is part of the output contract.
#[derive(Debug, Clone)]
pub struct Section {
    /// Section title (without the leading hashes or status tag).
    pub title: String,
    /// Source-level status, rendered as a heading suffix when degraded.
    pub status: SourceStatus,
    /// Markdown body below the heading line.
    pub body: String,
}

impl Section {
    /// The rendered heading line, e.g. `### WooCommerce Data (warning)`.
    pub fn heading_line(&self) -> String {
        let hashes = "#".repeat(SECTION_HEADING_DEPTH);
        if self.status.is_degraded() {
            format!("{hashes} {} ({})", self.title, self.status)
        } else {
            format!("{hashes} {}", self.title)
        }
    }

    /// Render the section as markdown: heading line + body.
    pub fn render(&self) -> String {
        format!("{}\n{}", self.heading_line(), self.body)
    }
}

/// An ordered sequence of sections plus a document title.
#[derive(Debug, Clone, Default)]
pub struct ReportDocument {
    /// Top-level report title (rendered as a level-1 heading).
    pub title: String,
    /// Sections in connector invocation order.
    pub sections: Vec<Section>,
}

impl ReportDocument {
    /// Create an empty document with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            sections: Vec::new(),
        }
    }

    /// Append a section, preserving insertion order.
    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// True when every section is a warning or an error. An empty
    /// document also counts as degraded (nothing useful to persist).
    pub fn all_degraded(&self) -> bool {
        self.sections.iter().all(|s| s.status.is_degraded())
    }

    /// Render the full composite document.
    pub fn render(&self) -> String {
        let joined = self
            .sections
            .iter()
            .map(Section::render)
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        format!("# {}\n\n{joined}", self.title)
    }
}

// ---------------------------------------------------------------------------
// Chunk / PublishOutcome
// ---------------------------------------------------------------------------

/// A self-contained, independently publishable fragment of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic source name for the KB ingestion API.
    pub label: String,
    /// Markdown content, normally beginning with one heading line.
    pub content: String,
}

/// Per-chunk publish result. Collected into the run tally; never an error.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// The chunk that was attempted.
    pub chunk: Chunk,
    /// Whether the KB acknowledged the chunk.
    pub success: bool,
    /// Captured failure detail when `success` is false.
    pub error_detail: Option<String>,
}
