//! Relationship discovery engine.
//!
//! Given one subject item, finds the items it references (outgoing), the
//! items that reference it (incoming, verified against their own fields),
//! and the items referenced from inside its composite fields (nested, keyed
//! by nesting path). Store failures never abort a run: they are recorded as
//! diagnostics and the run continues with whatever remains.
//!
//! # Example
//!
//! ```
//! use relmap::discovery::{discover, DiscoveryOptions};
//! use relmap::model::{Item, ItemType};
//! use relmap::store::MemoryStore;
//!
//! let mut store = MemoryStore::new();
//! let home = Item::new(1, ItemType::Document, 1, "Home");
//! store.add_item(home.clone());
//!
//! let report = discover(&store, &home, &DiscoveryOptions::default());
//! assert!(!report.result.has_any_result());
//! ```

pub mod aggregate;
pub mod classify;
mod concurrent;
pub mod diagnostics;
pub mod extract;
pub mod incoming;
pub mod nested;
pub mod outgoing;
#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{aggregate, DiscoveryResult, NestedEntry, NestedRelationSet, RelationSet};
pub use concurrent::discover_concurrent;
pub use diagnostics::{Deadline, Diagnostic, DiagnosticContext, DiagnosticKind, Diagnostics};

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::config::DiscoverySettings;
use crate::error::Result;
use crate::model::{Item, ItemType, Node, Schema};
use crate::store::ContentStore;

/// Separator between field names in a nesting path.
pub const PATH_SEPARATOR: &str = " → ";

/// Per-call engine options. Nothing here is process-wide.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Whether composite fields are traversed at all.
    pub enable_nested: bool,
    /// Item types results may contain. Buckets are always ordered by
    /// [`ItemType`] declaration, whatever the order of this list.
    pub target_types: Vec<ItemType>,
    /// Budget for a single store call.
    pub store_timeout: Duration,
    /// Budget for the whole run.
    pub request_deadline: Duration,
    /// Deepest composite instance level that is visited.
    pub max_nesting_depth: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            enable_nested: true,
            target_types: ItemType::ALL.to_vec(),
            store_timeout: Duration::from_millis(2000),
            request_deadline: Duration::from_millis(10_000),
            max_nesting_depth: 16,
        }
    }
}

impl From<&DiscoverySettings> for DiscoveryOptions {
    fn from(settings: &DiscoverySettings) -> Self {
        Self {
            enable_nested: settings.enable_nested_discovery,
            target_types: settings.target_types.clone(),
            store_timeout: Duration::from_millis(settings.store_timeout_ms),
            request_deadline: Duration::from_millis(settings.request_deadline_ms),
            max_nesting_depth: settings.max_nesting_depth,
        }
    }
}

impl DiscoveryOptions {
    pub fn supports(&self, item_type: ItemType) -> bool {
        self.target_types.contains(&item_type)
    }

    pub(crate) fn deadline(&self) -> Deadline {
        Deadline::start(self.request_deadline, self.store_timeout)
    }
}

/// Result of one run plus everything that went wrong along the way.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub result: DiscoveryResult,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-request state shared by the resolvers: store handle, options,
/// deadline and the diagnostics collected so far.
pub struct Session<'a, S: ContentStore + ?Sized> {
    store: &'a S,
    options: &'a DiscoveryOptions,
    deadline: Deadline,
    diagnostics: Diagnostics,
    deadline_reported: bool,
}

impl<'a, S: ContentStore + ?Sized> Session<'a, S> {
    pub fn new(store: &'a S, options: &'a DiscoveryOptions) -> Self {
        Self::with_deadline(store, options, options.deadline())
    }

    pub fn with_deadline(store: &'a S, options: &'a DiscoveryOptions, deadline: Deadline) -> Self {
        Self {
            store,
            options,
            deadline,
            diagnostics: Diagnostics::default(),
            deadline_reported: false,
        }
    }

    pub fn options(&self) -> &'a DiscoveryOptions {
        self.options
    }

    /// Run one store call, folding failure and timeout into `None`.
    ///
    /// A failed call is recorded as `kind`. A call that finishes past the
    /// per-call budget is discarded and recorded as a timeout. Once the
    /// request deadline has passed no further calls are made.
    pub fn guard<T>(
        &mut self,
        kind: DiagnosticKind,
        context: impl FnOnce() -> DiagnosticContext,
        call: impl FnOnce(&S) -> Result<T>,
    ) -> Option<T> {
        if self.deadline.expired() {
            if !self.deadline_reported {
                self.deadline_reported = true;
                self.diagnostics.record(
                    DiagnosticKind::Timeout,
                    context(),
                    "request deadline exceeded, skipping remaining store calls",
                );
            }
            return None;
        }

        let started = Instant::now();
        let outcome = call(self.store);
        let elapsed = started.elapsed();
        if elapsed > self.deadline.per_call() {
            self.diagnostics.record(
                DiagnosticKind::Timeout,
                context(),
                format!("store call took {:?}, limit is {:?}", elapsed, self.deadline.per_call()),
            );
            return None;
        }

        match outcome {
            Ok(value) => Some(value),
            Err(e) => {
                self.diagnostics.record(kind, context(), e.to_string());
                None
            }
        }
    }

    /// Schema of a node; `None` both when the store has none and when reading it failed.
    pub fn schema_of(&mut self, node: Node<'_>, path: Option<&str>) -> Option<Schema> {
        let schema = self.guard(
            DiagnosticKind::SchemaResolution,
            || DiagnosticContext::node(node.id()).path(path),
            |store| store.field_schema(node),
        )?;
        if schema.is_none() {
            log::debug!("Node {} has no schema, excluding it", node.id());
        }
        schema
    }

    pub fn record(&mut self, kind: DiagnosticKind, context: DiagnosticContext, message: impl Into<String>) {
        self.diagnostics.record(kind, context, message);
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_vec()
    }
}

/// Discover everything related to `subject`.
///
/// Always returns a result; failures are reported in
/// [`DiscoveryReport::diagnostics`].
pub fn discover<S: ContentStore + ?Sized>(store: &S, subject: &Item, options: &DiscoveryOptions) -> DiscoveryReport {
    let mut session = Session::new(store, options);

    let outgoing = outgoing::resolve_outgoing(&mut session, subject);
    let incoming = incoming::resolve_incoming(&mut session, subject, &options.target_types);
    let nested = if options.enable_nested {
        nested::resolve_nested(&mut session, subject)
    } else {
        NestedRelationSet::default()
    };

    let result = aggregate(outgoing, incoming, nested);
    log::debug!(
        "Discovery for item {}: outgoing={} incoming={} nested paths={}",
        subject.id,
        result.outgoing().len(),
        result.incoming().len(),
        result.nested().len()
    );

    DiscoveryReport {
        result,
        diagnostics: session.into_diagnostics(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::testing::{add_items, asset, doc, relation_field};
    use crate::model::ItemId;
    use crate::store::MemoryStore;

    #[test]
    fn test_buckets_ignore_target_type_order() {
        let mut store = MemoryStore::new();
        let home = doc(1, "Home");
        add_items(&mut store, &[home.clone(), doc(2, "About"), asset(3, "Logo")]);
        store
            .set_schema(home.id, Schema::new(vec![relation_field("related", "Related")]))
            .set_references(home.id, "related", &[ItemId(3), ItemId(2)]);

        let options = DiscoveryOptions {
            target_types: vec![ItemType::MediaAsset, ItemType::Document],
            ..DiscoveryOptions::default()
        };
        let report = discover(&store, &home, &options);
        let order: Vec<_> = report.result.outgoing().iter().map(|(item_type, _)| item_type).collect();
        assert_eq!(order, vec![ItemType::Document, ItemType::MediaAsset]);
        assert!(report.diagnostics.is_empty());
    }
}
