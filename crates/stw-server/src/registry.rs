//! Registry of connected live-reload clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};

/// Payload pushed to clients after a successful rebuild.
pub const RELOAD_MESSAGE: &str = "reload";

/// Identifies one registered client.
pub type ClientId = u64;

#[derive(Debug, Default)]
struct Clients {
    next_id: ClientId,
    senders: HashMap<ClientId, mpsc::Sender<&'static str>>,
}

/// Concurrent set of reload subscribers.
///
/// Every client owns a single-slot channel. A slot that is already full
/// means the client has a notification pending, so nothing is lost by
/// skipping it; a closed channel means the client went away and it is
/// dropped from the set during the same broadcast.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<Clients>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Clients> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a client. It stays registered until the subscription is dropped.
    pub fn register(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(1);

        let id = {
            let mut clients = self.lock();
            let id = clients.next_id;
            clients.next_id += 1;
            clients.senders.insert(id, sender);
            id
        };

        tracing::debug!("Reload client {} connected", id);

        Subscription {
            id,
            receiver,
            registry: self.clone(),
        }
    }

    /// Remove a client. Unknown ids are ignored.
    pub fn deregister(&self, id: ClientId) {
        if self.lock().senders.remove(&id).is_some() {
            tracing::debug!("Reload client {} disconnected", id);
        }
    }

    /// Queue `message` for every client, pruning the ones that are gone.
    ///
    /// Returns the number of clients that will see the message.
    pub fn broadcast(&self, message: &'static str) -> usize {
        let mut clients = self.lock();
        let mut delivered = 0;

        clients.senders.retain(|id, sender| match sender.try_send(message) {
            Ok(()) | Err(TrySendError::Full(_)) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Dropping reload client {}", id);
                false
            }
        });

        delivered
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registered client's end of the registry.
#[derive(Debug)]
pub struct Subscription {
    id: ClientId,
    receiver: mpsc::Receiver<&'static str>,
    registry: ClientRegistry,
}

impl Subscription {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Wait for the next message. `None` once the client was deregistered.
    pub async fn recv(&mut self) -> Option<&'static str> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
