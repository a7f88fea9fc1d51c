//! Ticket event fan-out to every connected socket.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::models::{BroadcastMode, TicketEvent};
use crate::protocol;

/// Registry of connected sockets and their outbound queues.
///
/// A whole broadcast runs under the registry lock, so two broadcasts never
/// interleave at any recipient. The relay does not read or write presence.
#[derive(Clone)]
pub struct EventRelay {
    clients: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<String>>>>,
    verbose: bool,
}

impl EventRelay {
    /// `verbose` logs every relayed and dropped event.
    pub fn new(verbose: bool) -> Self {
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            verbose,
        }
    }

    /// Register a socket; relayed frames arrive on the returned receiver.
    pub async fn join(&self, socket_id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.join_with(socket_id, tx).await;
        rx
    }

    /// Register a socket that shares an existing outbound queue.
    pub async fn join_with(&self, socket_id: &str, tx: mpsc::UnboundedSender<String>) {
        self.clients.lock().await.insert(socket_id.to_string(), tx);
    }

    /// Remove a socket from every future broadcast.
    pub async fn leave(&self, socket_id: &str) {
        self.clients.lock().await.remove(socket_id);
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Rebroadcast an event from `sender` verbatim. Returns how many sockets it was
    /// queued for, or `None` when the name is not in the catalog.
    pub async fn relay(&self, sender: &str, name: &str, payload: &Value) -> Option<usize> {
        let Some(event) = TicketEvent::from_name(name) else {
            if self.verbose {
                debug!(socket_id = %sender, event = %name, "dropping uncataloged event");
            }
            return None;
        };
        Some(self.broadcast(sender, event, payload).await)
    }

    /// Fan a cataloged event out according to its broadcast mode.
    pub async fn broadcast(&self, sender: &str, event: TicketEvent, payload: &Value) -> usize {
        let frame = protocol::encode_event(event.as_str(), payload);
        let skip_sender = event.mode() == BroadcastMode::Others;

        let mut delivered = 0;
        {
            let clients = self.clients.lock().await;
            for (id, tx) in clients.iter() {
                if skip_sender && id == sender {
                    continue;
                }
                // closed queues belong to sockets that are on their way out
                if tx.send(frame.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        if self.verbose {
            debug!(socket_id = %sender, event = %event.as_str(), delivered, "event relayed");
        }
        delivered
    }
}
