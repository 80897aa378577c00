#![forbid(unsafe_code)]

//! Deterministic FIFO queue state machine for a replicated consensus
//! log.
//!
//! Each replica applies the same ordered command stream with
//! [`apply`] and derives a byte-identical [`QueueState`]. The machine
//! performs no I/O and spawns nothing: every side effect is returned
//! as an [`Effect`] value for the host to execute, and release-cursor
//! effects tell the consensus layer how far its log may be compacted.
//!
//! Module hierarchy follows type dependency order:
//! - error: construction-time errors
//! - config: replicated tuning knobs
//! - command: identity atoms and the command surface
//! - customer: per-customer bookkeeping and the subscription policy
//! - effect: the effect protocol handed back to the host
//! - index: ordered live-index with shadow slots
//! - state: queue state and the checkout engine
//! - snapshot: shadow copies and canonical fingerprints
//! - apply: the command interpreter

pub mod apply;
pub mod command;
pub mod config;
pub mod customer;
pub mod effect;
pub mod error;
pub mod index;
pub mod snapshot;
pub mod state;

pub use apply::apply;
pub use command::{CheckoutSpec, Command, Lifetime, LogIndex, MessageId, Payload, QueueName};
pub use config::{MachineConfig, SHADOW_COPY_INTERVAL};
pub use customer::{CheckedOutMessage, Customer, SubscriptionAction};
pub use effect::{Effect, MetricsDelta};
pub use error::{FingerprintError, InvalidName};
pub use index::LiveIndex;
pub use snapshot::{fingerprint, shadow_copy};
pub use state::{Overview, QueueState};
