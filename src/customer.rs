//! Per-customer bookkeeping and the post-assignment subscription policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::{CheckoutSpec, Lifetime, LogIndex, MessageId, Payload};

/// A delivered but unsettled message, held under the customer that
/// checked it out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedOutMessage {
    /// Log index of the enqueue that produced the message. The only
    /// cross-reference between customers and messages.
    pub enqueued_at: LogIndex,
    pub payload: Payload,
}

/// Customer record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub lifetime: Lifetime,
    /// Outstanding-delivery window (the spec's `num`).
    pub credit: u64,
    pub checked_out: BTreeMap<MessageId, CheckedOutMessage>,
    pub next_msg_id: MessageId,
    /// Total messages ever delivered. Compared against `credit` for
    /// `Once` completion.
    pub seen: u64,
}

impl Customer {
    pub fn new(spec: CheckoutSpec) -> Self {
        Self {
            lifetime: spec.lifetime,
            credit: spec.credit,
            checked_out: BTreeMap::new(),
            next_msg_id: MessageId::ZERO,
            seen: 0,
        }
    }

    /// Re-checkout: replaces lifetime and credit, preserves everything
    /// else.
    pub fn update(&mut self, spec: CheckoutSpec) {
        self.lifetime = spec.lifetime;
        self.credit = spec.credit;
    }

    pub fn has_spare_credit(&self) -> bool {
        (self.checked_out.len() as u64) < self.credit
    }

    /// Decide the customer's fate after any change to `checked_out`,
    /// `credit`, or `seen`.
    pub fn subscription(&self) -> SubscriptionAction {
        match self.lifetime {
            Lifetime::Once if self.seen >= self.credit => {
                if self.checked_out.is_empty() {
                    SubscriptionAction::Complete
                } else {
                    SubscriptionAction::Park
                }
            }
            Lifetime::Once => SubscriptionAction::Service,
            Lifetime::Auto => {
                if self.has_spare_credit() {
                    SubscriptionAction::Service
                } else {
                    SubscriptionAction::Park
                }
            }
        }
    }

    /// Reduced form for shadow copies: scalar bookkeeping survives, the
    /// in-flight table does not.
    pub(crate) fn reduced(&self) -> Customer {
        Customer {
            checked_out: BTreeMap::new(),
            ..self.clone()
        }
    }
}

/// Outcome of the subscription policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionAction {
    /// Drained `Once` customer: remove it and stop watching the endpoint.
    Complete,
    /// Keep the customer but leave it off the service queue.
    Park,
    /// Keep the customer and make sure it waits on the service queue.
    Service,
}
