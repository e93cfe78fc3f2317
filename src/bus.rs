// SPDX-License-Identifier: PMPL-1.0-or-later
//! Cross-context message bus
//!
//! Execution contexts share no memory; they exchange plain serializable
//! values over a fire-and-forget broadcast channel. Two message shapes
//! exist: a start request naming a target tab, and a completion carrying
//! a [`ScanOutcome`] tagged with the originating request.
//!
//! Delivery goes to every subscriber that is listening when the message
//! fires. There is no delivery to late subscribers, so a surface must
//! call [`MessageBus::subscribe`] *before* issuing its start request -
//! the API returns the [`Subscription`] synchronously to make that
//! ordering natural.

use crate::coordinator::AuditRequest;
use crate::violation::ScanOutcome;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Messages crossing context boundaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    /// Ask the coordinator to audit a target tab
    Start { request: AuditRequest },
    /// An audit finished; broadcast to all current subscribers
    Complete {
        request: AuditRequest,
        payload: ScanOutcome,
    },
}

/// Fire-and-forget broadcast bus
#[derive(Debug, Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<Message>,
}

impl MessageBus {
    /// Create a bus retaining up to `capacity` undelivered messages per
    /// subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a subscriber. Only messages sent after this call are
    /// delivered.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Send a message to all current subscribers. Fire-and-forget: a bus
    /// with no listeners drops the message.
    pub fn send(&self, message: Message) {
        match self.sender.send(message) {
            Ok(delivered) => debug!(subscribers = delivered, "message delivered"),
            Err(_) => debug!("no subscribers, message dropped"),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(32)
    }
}

/// One subscriber's view of the bus
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<Message>,
}

impl Subscription {
    /// Receive the next message, or `None` once the bus is closed.
    ///
    /// A subscriber that falls behind the channel capacity skips the
    /// overwritten messages and keeps receiving from the oldest retained
    /// one.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive for callers polling between other work
    pub fn try_recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged, messages dropped");
                }
                Err(_) => return None,
            }
        }
    }
}
