//! Units of work and the values that flow between pipeline stages

use crate::url::canonical_identity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// What a task's document is expected to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// A listing page whose links are items to fetch
    DiscoveryPage,

    /// A single catalog entry
    Item,

    /// An entry reached through a composite page
    CompositeChild,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DiscoveryPage => "discovery_page",
            Self::Item => "item",
            Self::CompositeChild => "composite_child",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of fetch + extract work
///
/// Tasks are immutable once created. The identity is derived from the
/// reference at construction and is what deduplication keys on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    kind: TaskKind,
    reference: String,
    identity: String,
}

impl Task {
    pub fn new(kind: TaskKind, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let identity = canonical_identity(&reference);
        Self {
            kind,
            reference,
            identity,
        }
    }

    pub fn discovery(reference: impl Into<String>) -> Self {
        Self::new(TaskKind::DiscoveryPage, reference)
    }

    pub fn item(reference: impl Into<String>) -> Self {
        Self::new(TaskKind::Item, reference)
    }

    pub fn composite_child(reference: impl Into<String>) -> Self {
        Self::new(TaskKind::CompositeChild, reference)
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// A fetched page, owned by exactly one worker at a time
#[derive(Debug)]
pub struct Document {
    /// The reference that was requested
    pub reference: String,

    /// Where the content was finally served from, after redirects
    pub final_url: String,

    /// HTTP status code (or the transport's equivalent)
    pub status: u16,

    /// Content-Type header value
    pub content_type: String,

    /// Decoded body
    pub body: String,
}

impl Document {
    /// Builds a successful HTML document served from its own reference
    pub fn html(reference: impl Into<String>, body: impl Into<String>) -> Self {
        let reference = reference.into();
        Self {
            final_url: reference.clone(),
            reference,
            status: 200,
            content_type: "text/html; charset=utf-8".to_string(),
            body: body.into(),
        }
    }
}

/// Final structured output handed to the sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Key used to drop records reached through more than one path
    pub identity: String,

    /// Reference of the page the record was extracted from
    pub source: String,

    /// Site-specific fields
    pub fields: Map<String, Value>,

    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(identity: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            source: source.into(),
            fields: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// What the extractor made of one document
#[derive(Debug)]
pub enum ExtractionResult {
    /// A finished record
    Record(Record),

    /// Further tasks to enqueue (listing items or composite children)
    Tasks(Vec<Task>),

    /// Recognized, but nothing to emit or follow
    Empty,
}
