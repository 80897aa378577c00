//! The command interpreter: one deterministic, total transition per
//! log entry.
//!
//! `apply` never fails. Commands referencing customers or deliveries
//! that no longer exist (late settles after a down, replays past a
//! snapshot) degrade to no-ops that emit no effects and preserve every
//! invariant.

use tracing::debug;

use crate::command::{CheckoutSpec, Command, LogIndex, MessageId, Payload};
use crate::customer::Customer;
use crate::effect::{Effect, MetricsDelta};
use crate::snapshot::shadow_copy;
use crate::state::QueueState;

/// Interpret one log entry against the queue state.
///
/// Between two entries with log indices `i < j`, entry `i` is fully
/// applied before `j` begins; the consensus layer guarantees monotonic
/// application order.
pub fn apply<C: Ord + Clone>(
    state: &mut QueueState<C>,
    log_index: LogIndex,
    command: Command<C>,
) -> Vec<Effect<C>> {
    match command {
        Command::Enqueue { payload } => apply_enqueue(state, log_index, payload),
        Command::Checkout { spec, customer } => apply_checkout(state, spec, customer),
        Command::Settle { msg_id, customer } => apply_settle(state, log_index, msg_id, customer),
        Command::Return { msg_id, customer } => apply_return(state, msg_id, customer),
        Command::Down { customer } => apply_down(state, customer),
    }
}

fn apply_enqueue<C: Ord + Clone>(
    state: &mut QueueState<C>,
    log_index: LogIndex,
    payload: Payload,
) -> Vec<Effect<C>> {
    let shadow = if state.enqueue_count + 1 >= state.config.shadow_copy_interval {
        // captured before this enqueue contributes to state, counter
        // included: replaying this entry from the shadow re-arms the
        // cadence at exactly this index
        let snapshot = Box::new(shadow_copy(state));
        state.enqueue_count = 1;
        Some(snapshot)
    } else {
        state.enqueue_count += 1;
        None
    };

    state.enqueue_message(log_index, payload, shadow);

    let mut effects = Vec::new();
    let delivered = state.run_checkout(&mut effects);
    effects.push(incr_metrics(
        state,
        MetricsDelta {
            enqueues: 1,
            checkouts: delivered,
            ..MetricsDelta::default()
        },
    ));
    effects
}

fn apply_checkout<C: Ord + Clone>(
    state: &mut QueueState<C>,
    spec: CheckoutSpec,
    customer: C,
) -> Vec<Effect<C>> {
    let mut effects = vec![Effect::Monitor {
        customer: customer.clone(),
    }];

    state
        .customers
        .entry(customer.clone())
        .and_modify(|existing| existing.update(spec))
        .or_insert_with(|| Customer::new(spec));
    state.apply_subscription_policy(&customer, &mut effects);

    let delivered = state.run_checkout(&mut effects);
    effects.push(incr_metrics(
        state,
        MetricsDelta {
            checkouts: delivered,
            ..MetricsDelta::default()
        },
    ));
    effects
}

fn apply_settle<C: Ord + Clone>(
    state: &mut QueueState<C>,
    log_index: LogIndex,
    msg_id: MessageId,
    customer: C,
) -> Vec<Effect<C>> {
    let Some(existing) = state.customers.get_mut(&customer) else {
        return Vec::new();
    };
    let Some(settled) = existing.checked_out.remove(&msg_id) else {
        return Vec::new();
    };

    let mut effects = Vec::new();
    state.apply_subscription_policy(&customer, &mut effects);
    state.index.delete(settled.enqueued_at);
    let delivered = state.run_checkout(&mut effects);
    if let Some(cursor) = update_release_cursor(state, log_index, settled.enqueued_at) {
        effects.push(cursor);
    }
    effects.push(incr_metrics(
        state,
        MetricsDelta {
            checkouts: delivered,
            settlements: 1,
            ..MetricsDelta::default()
        },
    ));
    effects
}

fn apply_return<C: Ord + Clone>(
    state: &mut QueueState<C>,
    msg_id: MessageId,
    customer: C,
) -> Vec<Effect<C>> {
    let Some(existing) = state.customers.get_mut(&customer) else {
        return Vec::new();
    };
    let Some(returned) = existing.checked_out.remove(&msg_id) else {
        return Vec::new();
    };

    let mut effects = Vec::new();
    state.apply_subscription_policy(&customer, &mut effects);
    // the index entry survived the checked-out phase; only the
    // unassigned set gets the message back
    state.return_message(returned.enqueued_at, returned.payload);
    let delivered = state.run_checkout(&mut effects);
    effects.push(incr_metrics(
        state,
        MetricsDelta {
            checkouts: delivered,
            returns: 1,
            ..MetricsDelta::default()
        },
    ));
    effects
}

fn apply_down<C: Ord + Clone>(state: &mut QueueState<C>, customer: C) -> Vec<Effect<C>> {
    let Some(removed) = state.customers.remove(&customer) else {
        return Vec::new();
    };
    state.remove_service(&customer);

    let returned = removed.checked_out.len() as u64;
    for msg in removed.checked_out.into_values() {
        state.return_message(msg.enqueued_at, msg.payload);
    }
    debug!(returned, "customer down, unsettled deliveries returned");

    vec![incr_metrics(
        state,
        MetricsDelta {
            returns: returned,
            ..MetricsDelta::default()
        },
    )]
}

/// Advance the release cursor after a settle, if possible.
///
/// `incoming` is the settle's own log index, `settled` the log index of
/// the message it removed. The emitted pair promises that the log up to
/// and including the cursor index is captured by the snapshot.
fn update_release_cursor<C: Ord + Clone>(
    state: &mut QueueState<C>,
    incoming: LogIndex,
    settled: LogIndex,
) -> Option<Effect<C>> {
    if state.index.is_empty() {
        // no live messages and no pending enqueues: the settle itself is
        // the last entry with any effect, so the cursor lands on it
        state.first_enqueue_log_index = None;
        let snapshot = Box::new(shadow_copy(state));
        debug!(log_index = incoming.get(), "queue drained, release cursor advanced");
        return Some(Effect::ReleaseCursor {
            log_index: incoming,
            snapshot,
        });
    }

    if Some(settled) != state.first_enqueue_log_index {
        return None;
    }

    let (smallest, shadow) = state
        .index
        .smallest()
        .map(|(idx, shadow)| (idx, shadow.cloned()))?;
    state.first_enqueue_log_index = Some(smallest);
    // `smallest` is the first index whose effect is still live, so the
    // shadow captured just before it covers everything up to the
    // preceding index
    let shadow = shadow?;
    let cursor = smallest.prev()?;
    debug!(log_index = cursor.get(), "release cursor advanced");
    Some(Effect::ReleaseCursor {
        log_index: cursor,
        snapshot: Box::new(shadow),
    })
}

fn incr_metrics<C>(state: &QueueState<C>, deltas: MetricsDelta) -> Effect<C> {
    Effect::IncrMetrics {
        queue: state.name().clone(),
        deltas,
    }
}
