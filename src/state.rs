//! Queue state: unassigned messages, live index, customers, service
//! queue, and the checkout engine that pairs them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::command::{LogIndex, Payload, QueueName};
use crate::config::MachineConfig;
use crate::customer::{CheckedOutMessage, Customer, SubscriptionAction};
use crate::effect::{Effect, MetricsDelta};
use crate::index::LiveIndex;

/// The replicated queue state.
///
/// Pure data: every replica that applies the same command stream holds a
/// byte-identical value. `C` is the opaque customer identity; it must be
/// totally ordered so that all iteration (monitors, snapshots, canonical
/// encoding) is deterministic across replicas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: Ord + serde::Deserialize<'de>"
))]
pub struct QueueState<C> {
    pub(crate) name: QueueName,
    /// Unassigned messages, keyed by the enqueue's log index. Ordering
    /// derives from the key, never from insertion.
    pub(crate) messages: BTreeMap<LogIndex, Payload>,
    /// Every log index still contributing to state, with shadow slots.
    pub(crate) index: LiveIndex<C>,
    /// Cached smallest unassigned log index.
    pub(crate) low_index: Option<LogIndex>,
    /// Smallest log index of any message still contributing to state.
    pub(crate) first_enqueue_log_index: Option<LogIndex>,
    pub(crate) customers: BTreeMap<C, Customer>,
    /// Customers awaiting service, each at most once. Head is served
    /// first; re-appends rotate, so dispatch is fair modulo credit.
    pub(crate) service_queue: VecDeque<C>,
    /// Shadow-copy cadence counter.
    pub(crate) enqueue_count: u64,
    pub(crate) config: MachineConfig,
}

/// Read-only operator summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub kind: &'static str,
    pub num_customers: usize,
    pub num_messages: usize,
    pub num_checked_out: usize,
}

impl<C> QueueState<C> {
    /// Create an empty queue and announce its metrics row.
    pub fn init(name: QueueName, config: MachineConfig) -> (Self, Vec<Effect<C>>) {
        let state = Self {
            name: name.clone(),
            messages: BTreeMap::new(),
            index: LiveIndex::new(),
            low_index: None,
            first_enqueue_log_index: None,
            customers: BTreeMap::new(),
            service_queue: VecDeque::new(),
            enqueue_count: 0,
            config,
        };
        let effects = vec![Effect::IncrMetrics {
            queue: name,
            deltas: MetricsDelta::default(),
        }];
        (state, effects)
    }

    pub fn name(&self) -> &QueueName {
        &self.name
    }

    pub fn config(&self) -> MachineConfig {
        self.config
    }

    pub fn messages(&self) -> &BTreeMap<LogIndex, Payload> {
        &self.messages
    }

    pub fn customers(&self) -> &BTreeMap<C, Customer> {
        &self.customers
    }

    pub fn live_index(&self) -> &LiveIndex<C> {
        &self.index
    }

    pub fn first_enqueue_log_index(&self) -> Option<LogIndex> {
        self.first_enqueue_log_index
    }

    pub fn service_queue(&self) -> impl Iterator<Item = &C> {
        self.service_queue.iter()
    }

    pub fn overview(&self) -> Overview {
        Overview {
            kind: "fifo",
            num_customers: self.customers.len(),
            num_messages: self.messages.len(),
            num_checked_out: self
                .customers
                .values()
                .map(|customer| customer.checked_out.len())
                .sum(),
        }
    }
}

impl<C: Ord + Clone> QueueState<C> {
    /// Effects for a replica that just became leader: begin observing
    /// every known customer endpoint. Customer identities survive leader
    /// changes; monitors do not.
    pub fn leader_effects(&self) -> Vec<Effect<C>> {
        self.customers
            .keys()
            .map(|customer| Effect::Monitor {
                customer: customer.clone(),
            })
            .collect()
    }

    pub(crate) fn enqueue_message(
        &mut self,
        idx: LogIndex,
        payload: Payload,
        shadow: Option<Box<QueueState<C>>>,
    ) {
        self.index.append(idx, shadow);
        self.messages.insert(idx, payload);
        self.low_index = Some(self.low_index.map_or(idx, |cur| cur.min(idx)));
        self.first_enqueue_log_index =
            Some(self.first_enqueue_log_index.map_or(idx, |cur| cur.min(idx)));
    }

    /// Put a message back into the unassigned set at its original log
    /// index. The index entry is still present from the enqueue.
    pub(crate) fn return_message(&mut self, idx: LogIndex, payload: Payload) {
        self.messages.insert(idx, payload);
        self.low_index = Some(self.low_index.map_or(idx, |cur| cur.min(idx)));
    }

    /// Append the customer to the service queue unless it already waits.
    pub(crate) fn ensure_service(&mut self, id: C) {
        if !self.service_queue.contains(&id) {
            self.service_queue.push_back(id);
        }
    }

    pub(crate) fn remove_service(&mut self, id: &C) {
        self.service_queue.retain(|queued| queued != id);
    }

    /// Enact the subscription policy for one customer, syncing its
    /// service-queue membership and dropping it when drained.
    pub(crate) fn apply_subscription_policy(&mut self, id: &C, effects: &mut Vec<Effect<C>>) {
        let Some(customer) = self.customers.get(id) else {
            return;
        };
        match customer.subscription() {
            SubscriptionAction::Complete => {
                self.customers.remove(id);
                self.remove_service(id);
                trace!("once customer drained");
                effects.push(Effect::Demonitor {
                    customer: id.clone(),
                });
            }
            SubscriptionAction::Park => self.remove_service(id),
            SubscriptionAction::Service => self.ensure_service(id.clone()),
        }
    }

    /// Pair the head of the unassigned messages with the head of the
    /// service queue until either side runs dry. Returns the number of
    /// deliveries performed; `SendMsg` effects are pushed in order.
    pub(crate) fn run_checkout(&mut self, effects: &mut Vec<Effect<C>>) -> u64 {
        let mut delivered = 0;
        loop {
            let Some(low) = self.low_index else {
                break;
            };
            let Some(customer_id) = self.service_queue.pop_front() else {
                break;
            };
            let Some(customer) = self.customers.get_mut(&customer_id) else {
                // stale entry; the message is not consumed
                continue;
            };
            let Some(payload) = self.messages.remove(&low) else {
                break;
            };

            let msg_id = customer.next_msg_id;
            customer.checked_out.insert(
                msg_id,
                CheckedOutMessage {
                    enqueued_at: low,
                    payload: payload.clone(),
                },
            );
            customer.next_msg_id = msg_id.next();
            customer.seen += 1;

            // re-queue decision; the pop above guarantees absence, so a
            // plain push keeps the at-most-once property
            if customer.subscription() == SubscriptionAction::Service {
                self.service_queue.push_back(customer_id.clone());
            }

            self.low_index = self.messages.keys().next().copied();
            effects.push(Effect::SendMsg {
                customer: customer_id,
                msg_id,
                payload,
            });
            delivered += 1;
        }
        delivered
    }
}

impl<C: Ord + fmt::Debug> QueueState<C> {
    /// Panic unless the structural invariants hold. Test support; called
    /// by the property suites after every apply.
    pub fn check_invariants(&self) {
        assert_eq!(
            self.low_index,
            self.messages.keys().next().copied(),
            "low_index must cache the smallest unassigned log index"
        );

        let mut live: BTreeSet<LogIndex> = BTreeSet::new();
        for idx in self.messages.keys() {
            assert!(live.insert(*idx), "duplicate live index {idx:?}");
        }
        for (id, customer) in &self.customers {
            for msg in customer.checked_out.values() {
                assert!(
                    live.insert(msg.enqueued_at),
                    "index {:?} live twice (customer {id:?})",
                    msg.enqueued_at
                );
            }
        }
        let indexed: BTreeSet<LogIndex> = self.index.keys().collect();
        assert_eq!(live, indexed, "live index out of sync with contents");

        assert_eq!(
            self.first_enqueue_log_index,
            self.index.smallest().map(|(idx, _)| idx),
            "first_enqueue_log_index must track index.smallest()"
        );

        let mut seen_ids = BTreeSet::new();
        for id in &self.service_queue {
            assert!(seen_ids.insert(id), "customer {id:?} queued twice");
            let customer = self
                .customers
                .get(id)
                .unwrap_or_else(|| panic!("queued customer {id:?} does not exist"));
            assert!(
                customer.has_spare_credit(),
                "customer {id:?} queued without spare credit"
            );
        }

        for (id, customer) in &self.customers {
            if customer.lifetime == crate::command::Lifetime::Once {
                assert!(
                    customer.seen < customer.credit || !customer.checked_out.is_empty(),
                    "drained once customer {id:?} still present"
                );
            }
            assert_eq!(
                customer.next_msg_id.get(),
                customer.seen,
                "customer {id:?} delivery counters diverged"
            );
            if let Some((max_id, _)) = customer.checked_out.last_key_value() {
                assert!(
                    *max_id < customer.next_msg_id,
                    "customer {id:?} holds an unassigned message id"
                );
            }
        }
    }
}
