use std::sync::Arc;
use tokio::task;

use super::incoming::resolve_incoming;
use super::nested::resolve_nested;
use super::outgoing::resolve_outgoing;
use super::{aggregate, Diagnostics, DiscoveryOptions, DiscoveryReport, NestedRelationSet, Session};
use crate::error::{RelmapError, Result};
use crate::model::Item;
use crate::store::ContentStore;

/// Same as [`discover`](super::discover), with outgoing, incoming and nested
/// resolution running as three blocking tasks.
///
/// The three tasks share one request deadline. Their diagnostics are merged
/// in the order outgoing, incoming, nested, so the report matches the
/// sequential one for the same store state.
pub async fn discover_concurrent<S>(store: Arc<S>, subject: Item, options: DiscoveryOptions) -> Result<DiscoveryReport>
where
    S: ContentStore + 'static,
{
    let deadline = options.deadline();
    let subject = Arc::new(subject);
    let options = Arc::new(options);

    let outgoing_task = {
        let (store, subject, options) = (Arc::clone(&store), Arc::clone(&subject), Arc::clone(&options));
        task::spawn_blocking(move || {
            let mut session = Session::with_deadline(store.as_ref(), &options, deadline);
            let relations = resolve_outgoing(&mut session, &subject);
            (relations, session.into_diagnostics())
        })
    };

    let incoming_task = {
        let (store, subject, options) = (Arc::clone(&store), Arc::clone(&subject), Arc::clone(&options));
        task::spawn_blocking(move || {
            let mut session = Session::with_deadline(store.as_ref(), &options, deadline);
            let relations = resolve_incoming(&mut session, &subject, &options.target_types);
            (relations, session.into_diagnostics())
        })
    };

    let nested_task = {
        let (store, subject, options) = (Arc::clone(&store), Arc::clone(&subject), Arc::clone(&options));
        task::spawn_blocking(move || {
            if !options.enable_nested {
                return (NestedRelationSet::default(), Vec::new());
            }
            let mut session = Session::with_deadline(store.as_ref(), &options, deadline);
            let nested = resolve_nested(&mut session, &subject);
            (nested, session.into_diagnostics())
        })
    };

    let (outgoing, incoming, nested) = tokio::join!(outgoing_task, incoming_task, nested_task);
    let (outgoing, outgoing_diagnostics) = outgoing.map_err(|e| RelmapError::Internal(e.to_string()))?;
    let (incoming, incoming_diagnostics) = incoming.map_err(|e| RelmapError::Internal(e.to_string()))?;
    let (nested, nested_diagnostics) = nested.map_err(|e| RelmapError::Internal(e.to_string()))?;

    let mut diagnostics = Diagnostics::default();
    diagnostics.extend(outgoing_diagnostics);
    diagnostics.extend(incoming_diagnostics);
    diagnostics.extend(nested_diagnostics);

    Ok(DiscoveryReport {
        result: aggregate(outgoing, incoming, nested),
        diagnostics: diagnostics.into_vec(),
    })
}
