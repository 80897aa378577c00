//! Identity atoms and the command surface.
//!
//! LogIndex: position in the consensus log (observed, never generated)
//! MessageId: per-customer delivery counter
//! Payload: opaque message body
//! QueueName: symbolic queue identity, used for the metrics row
//! Command: the closed set of log entries the machine interprets

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::InvalidName;

/// Position in the consensus log.
///
/// Assigned by the consensus layer; the state machine only observes it.
/// Application order is monotonically increasing.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogIndex(u64);

impl LogIndex {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The preceding log index, or `None` at the start of the log.
    pub fn prev(self) -> Option<LogIndex> {
        self.0.checked_sub(1).map(Self)
    }
}

impl fmt::Debug for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogIndex({})", self.0)
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<LogIndex> for u64 {
    fn from(value: LogIndex) -> u64 {
        value.0
    }
}

/// Delivery identifier, scoped per customer.
///
/// Assigned in checkout order starting at 0 and incremented on every
/// delivery to that customer.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub const ZERO: MessageId = MessageId(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> MessageId {
        MessageId(self.0.checked_add(1).expect("message id overflow"))
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque message body supplied by the client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Bytes);

impl Payload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub const fn from_static(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Symbolic queue name - non-empty string.
///
/// Identifies the queue's metrics row; not interpreted otherwise.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidName> {
        let s = s.into();
        if s.is_empty() {
            Err(InvalidName {
                raw: s,
                reason: "empty".into(),
            })
        } else {
            Ok(Self(s))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueueName({:?})", self.0)
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Customer subscription lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifetime {
    /// Drains after `credit` deliveries, then the customer is removed.
    Once,
    /// Persistent: keeps requesting work while it has spare credit.
    Auto,
}

/// Checkout request: lifetime plus outstanding-delivery window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSpec {
    pub lifetime: Lifetime,
    /// Maximum unsettled deliveries the customer will hold at once.
    pub credit: u64,
}

impl CheckoutSpec {
    pub fn once(credit: u64) -> Self {
        Self {
            lifetime: Lifetime::Once,
            credit,
        }
    }

    pub fn auto(credit: u64) -> Self {
        Self {
            lifetime: Lifetime::Auto,
            credit,
        }
    }
}

/// A log entry interpreted by the state machine.
///
/// The surface is a closed set; the interpreter matches exhaustively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command<C> {
    /// Append a message to the queue.
    Enqueue { payload: Payload },
    /// Create or update a customer subscription.
    Checkout { spec: CheckoutSpec, customer: C },
    /// Permanently acknowledge a delivery; the message leaves the queue.
    Settle { msg_id: MessageId, customer: C },
    /// Negatively acknowledge a delivery; the message re-enters the queue
    /// at its original position.
    Return { msg_id: MessageId, customer: C },
    /// The customer endpoint is gone; its unsettled deliveries return to
    /// the queue.
    Down { customer: C },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_index_prev_stops_at_zero() {
        assert_eq!(LogIndex::new(3).prev(), Some(LogIndex::new(2)));
        assert_eq!(LogIndex::new(0).prev(), None);
    }

    #[test]
    fn message_id_is_dense_from_zero() {
        let id = MessageId::ZERO;
        assert_eq!(id.get(), 0);
        assert_eq!(id.next().get(), 1);
        assert_eq!(id.next().next().get(), 2);
    }

    #[test]
    fn queue_name_rejects_empty() {
        assert!(QueueName::new("orders").is_ok());
        let err = QueueName::new("").unwrap_err();
        assert_eq!(err.reason, "empty");
    }
}
