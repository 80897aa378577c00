//! Effects the state machine hands back to its host.
//!
//! Effects are values, never executed inline: the host runs them after
//! `apply` returns, in order. This keeps the transition function pure
//! and lets tests assert on intent instead of observing side effects.

use serde::{Deserialize, Serialize};

use crate::command::{LogIndex, MessageId, Payload, QueueName};
use crate::state::QueueState;

/// Counter deltas for the queue's metrics row.
///
/// The host owns the sink; the machine only reports what happened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsDelta {
    pub enqueues: u64,
    pub checkouts: u64,
    pub settlements: u64,
    pub returns: u64,
}

/// A side-effecting action for the host to execute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: Ord + serde::Deserialize<'de>"
))]
pub enum Effect<C> {
    /// Watch liveness of the customer endpoint.
    Monitor { customer: C },
    /// Stop watching.
    Demonitor { customer: C },
    /// Deliver a message to the customer.
    SendMsg {
        customer: C,
        msg_id: MessageId,
        payload: Payload,
    },
    /// Atomically add deltas to the queue's metrics row.
    IncrMetrics {
        queue: QueueName,
        deltas: MetricsDelta,
    },
    /// Authorize log compaction up to and including `log_index`; the
    /// snapshot captures every effect of the log through that index.
    ReleaseCursor {
        log_index: LogIndex,
        snapshot: Box<QueueState<C>>,
    },
}

#[cfg(test)]
mod tests {
    use super::MetricsDelta;

    #[test]
    fn delta_default_is_all_zero() {
        let delta = MetricsDelta::default();
        assert_eq!(delta.enqueues, 0);
        assert_eq!(delta.checkouts, 0);
        assert_eq!(delta.settlements, 0);
        assert_eq!(delta.returns, 0);
    }
}
