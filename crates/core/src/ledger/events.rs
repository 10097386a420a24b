//! Posting events and the in-process event bus.
//!
//! Services publish after a successful write. Publishing never fails a
//! posting: an event with no subscribers is simply dropped.

use ledgerline_shared::types::{OfficeId, TransactionId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::entry::EntryKind;

/// Something that happened to a transaction group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostingEvent {
    /// A new group was written.
    Created {
        /// The new group.
        transaction_id: TransactionId,
        /// Home office, if known.
        office_id: Option<OfficeId>,
        /// What produced the group.
        kind: EntryKind,
        /// Number of rows written.
        entry_count: usize,
    },
    /// A group was reversed.
    Reversed {
        /// The reversed group.
        original_transaction_id: TransactionId,
        /// The mirror group.
        reversal_transaction_id: TransactionId,
    },
    /// A group was reconciled.
    Reconciled {
        /// The reconciled group.
        transaction_id: TransactionId,
    },
}

/// Discriminant of [`PostingEvent`] used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingEventKind {
    /// [`PostingEvent::Created`]
    Created,
    /// [`PostingEvent::Reversed`]
    Reversed,
    /// [`PostingEvent::Reconciled`]
    Reconciled,
}

impl PostingEvent {
    /// Returns the event's kind.
    #[must_use]
    pub const fn kind(&self) -> PostingEventKind {
        match self {
            Self::Created { .. } => PostingEventKind::Created,
            Self::Reversed { .. } => PostingEventKind::Reversed,
            Self::Reconciled { .. } => PostingEventKind::Reconciled,
        }
    }
}

/// Broadcast bus for [`PostingEvent`]s.
#[derive(Debug, Clone)]
pub struct PostingEventBus {
    sender: broadcast::Sender<PostingEvent>,
}

impl PostingEventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to the given kinds only.
    #[must_use]
    pub fn subscribe(&self, kinds: &[PostingEventKind]) -> PostingSubscription {
        PostingSubscription {
            receiver: self.sender.subscribe(),
            kinds: kinds.to_vec(),
        }
    }

    /// Publishes an event. Returns the number of subscribers reached.
    pub fn publish(&self, event: PostingEvent) -> usize {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!(?kind, "No subscribers for posting event");
                0
            }
        }
    }
}

impl Default for PostingEventBus {
    fn default() -> Self {
        Self::new(1_024)
    }
}

/// A filtered stream of posting events.
#[derive(Debug)]
pub struct PostingSubscription {
    receiver: broadcast::Receiver<PostingEvent>,
    kinds: Vec<PostingEventKind>,
}

impl PostingSubscription {
    /// Waits for the next event of a subscribed kind.
    ///
    /// # Errors
    ///
    /// `Lagged` if events were dropped because the subscriber fell behind,
    /// `Closed` once every bus handle is gone.
    pub async fn recv(&mut self) -> Result<PostingEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.kinds.contains(&event.kind()) {
                return Ok(event);
            }
        }
    }
}
