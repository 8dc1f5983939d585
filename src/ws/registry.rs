//! Connection registry - routes server frames to live sockets

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::game::ConnectionId;
use crate::ws::protocol::ServerMsg;

/// Outbound channel capacity per connection. A client that cannot drain
/// this many frames is effectively gone; further frames are dropped.
const OUTBOUND_BUFFER: usize = 64;

/// A batch of frames addressed to specific connections, fully captured
/// while the store lock was held
pub type Outbox = Vec<(ConnectionId, ServerMsg)>;

/// Maps connection identity to its outbound frame sender.
///
/// Registration happens on socket accept, removal on disconnect. Delivery
/// never touches session state, so it is safe after the store lock is
/// released.
pub struct ConnectionRegistry {
    senders: DashMap<ConnectionId, mpsc::Sender<ServerMsg>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    pub fn channel() -> (mpsc::Sender<ServerMsg>, mpsc::Receiver<ServerMsg>) {
        mpsc::channel(OUTBOUND_BUFFER)
    }

    pub fn register(&self, connection: ConnectionId, sender: mpsc::Sender<ServerMsg>) {
        self.senders.insert(connection, sender);
    }

    pub fn unregister(&self, connection: ConnectionId) {
        self.senders.remove(&connection);
    }

    pub fn connected(&self) -> usize {
        self.senders.len()
    }

    /// Deliver every frame in the outbox. Non-blocking: a full or closed
    /// channel drops the frame for that connection rather than stalling
    /// the caller.
    pub fn deliver(&self, outbox: Outbox) {
        for (connection, msg) in outbox {
            let Some(sender) = self.senders.get(&connection) else {
                debug!(connection_id = %connection, "Dropping frame for unknown connection");
                continue;
            };

            if let Err(e) = sender.try_send(msg) {
                warn!(connection_id = %connection, error = %e, "Failed to queue outbound frame");
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
