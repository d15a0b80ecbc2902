//! Soft-failure bookkeeping for a discovery run.
//!
//! Nothing that goes wrong while reading the store aborts discovery. Each
//! failure becomes a [`Diagnostic`], is logged once when recorded, and is
//! handed back to the caller next to the (possibly partial) result.

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

use crate::model::{ItemId, ItemType};

/// Category of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Reading a node's schema failed.
    SchemaResolution,
    /// Reading a field value failed.
    FieldRead,
    /// A relation or composite query failed.
    StoreQuery,
    /// A store call ran past its budget, or the request deadline passed.
    Timeout,
    /// Composite nesting went deeper than allowed.
    DepthLimit,
    /// A composite instance was found inside itself.
    Cycle,
}

/// Where a failure happened. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type: Option<ItemType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DiagnosticContext {
    pub fn node(id: ItemId) -> Self {
        Self {
            item_id: Some(id),
            ..Self::default()
        }
    }

    pub fn field(mut self, handle: &str) -> Self {
        self.field_handle = Some(handle.to_string());
        self
    }

    pub fn target(mut self, item_type: ItemType) -> Self {
        self.target_type = Some(item_type);
        self
    }

    pub fn path(mut self, path: Option<&str>) -> Self {
        self.path = path.map(str::to_string);
        self
    }
}

impl fmt::Display for DiagnosticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = self.item_id {
            parts.push(format!("item={}", id));
        }
        if let Some(handle) = &self.field_handle {
            parts.push(format!("field={}", handle));
        }
        if let Some(item_type) = self.target_type {
            parts.push(format!("type={}", item_type));
        }
        if let Some(path) = &self.path {
            parts.push(format!("path=\"{}\"", path));
        }
        f.write_str(&parts.join(" "))
    }
}

/// One recorded soft failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub context: DiagnosticContext,
    pub message: String,
}

/// Ordered collection of diagnostics for one run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn record(&mut self, kind: DiagnosticKind, context: DiagnosticContext, message: impl Into<String>) {
        let message = message.into();
        log::warn!("Discovery {:?} failure [{}]: {}", kind, context, message);
        self.entries.push(Diagnostic { kind, context, message });
    }

    pub fn extend(&mut self, other: Vec<Diagnostic>) {
        self.entries.extend(other);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

/// Time budget for one discovery request.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    overall: Duration,
    per_call: Duration,
}

impl Deadline {
    pub fn start(overall: Duration, per_call: Duration) -> Self {
        Self {
            started: Instant::now(),
            overall,
            per_call,
        }
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.overall
    }

    pub fn per_call(&self) -> Duration {
        self.per_call
    }
}
