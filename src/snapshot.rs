//! Shadow copies and canonical state fingerprints.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::command::Lifetime;
use crate::customer::Customer;
use crate::error::FingerprintError;
use crate::index::LiveIndex;
use crate::state::QueueState;

/// Produce the reduced state published with a release cursor.
///
/// Scalar bookkeeping survives: the queue name, the tuning config, the
/// shadow-copy counter, and every `Auto` customer with its in-flight
/// table emptied (their delivery counters must keep advancing from the
/// same point when the log suffix is replayed). `Once` customers do not
/// survive a snapshot: a one-shot checkout is bound to the log prefix
/// that served it, and its late settles replay as no-ops. The service
/// queue is kept, filtered to the surviving customers, in order, so
/// replayed enqueues dispatch exactly as the original run did.
///
/// Everything positional is cleared: messages, the live index, and both
/// cached low/first-enqueue indices. The log suffix rebuilds them.
pub fn shadow_copy<C: Ord + Clone>(state: &QueueState<C>) -> QueueState<C> {
    let customers: BTreeMap<C, Customer> = state
        .customers
        .iter()
        .filter(|(_, customer)| customer.lifetime == Lifetime::Auto)
        .map(|(id, customer)| (id.clone(), customer.reduced()))
        .collect();
    let service_queue = state
        .service_queue
        .iter()
        .filter(|id| customers.contains_key(*id))
        .cloned()
        .collect();

    QueueState {
        name: state.name.clone(),
        messages: BTreeMap::new(),
        index: LiveIndex::new(),
        low_index: None,
        first_enqueue_log_index: None,
        customers,
        service_queue,
        enqueue_count: state.enqueue_count,
        config: state.config,
    }
}

/// Canonical byte encoding of a state or snapshot.
///
/// Every container in the state is a `BTreeMap` or an ordered sequence
/// and struct fields encode in declaration order, so the JSON encoding
/// is already canonical: equal states produce equal bytes on every
/// replica.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<Vec<u8>, FingerprintError> {
    Ok(serde_json::to_vec(value)?)
}
