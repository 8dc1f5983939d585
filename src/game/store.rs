//! Session store - the single-lock table of live sessions

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use super::session::{ConnectionId, GameSession, PlayerSlot, SessionId, SessionPhase};
use super::GameError;

/// Default bound on concurrent sessions
pub const DEFAULT_MAX_SESSIONS: usize = 100;

/// Lobby listing entry for a session still waiting for its second player
#[derive(Debug, Clone)]
pub struct OpenSession {
    pub id: SessionId,
    pub player_one: String,
    pub created_at: DateTime<Utc>,
}

/// Store-wide counters for the health endpoint
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub total: usize,
    pub waiting: usize,
    pub in_progress: usize,
}

/// Everything the store lock guards: the session map, insertion order for
/// lobby listing, and the connection binding table.
///
/// Sessions are never evicted; finished sessions stay queryable and count
/// against capacity until process end.
pub struct SessionTable {
    sessions: HashMap<SessionId, GameSession>,
    order: Vec<SessionId>,
    bindings: HashMap<ConnectionId, (SessionId, PlayerSlot)>,
    capacity: usize,
}

impl SessionTable {
    fn new(capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            order: Vec::new(),
            bindings: HashMap::new(),
            capacity,
        }
    }

    /// Create a session with player one seated and their fleet placed
    pub fn create(&mut self, player_name: String) -> Result<&GameSession, GameError> {
        if self.sessions.len() >= self.capacity {
            return Err(GameError::CapacityExceeded);
        }

        let id = Uuid::new_v4();
        let mut rng = ChaCha8Rng::seed_from_u64(rand::random());
        let session = GameSession::new(id, player_name, &mut rng);

        self.order.push(id);
        Ok(self.sessions.entry(id).or_insert(session))
    }

    /// Seat the second player in a waiting session
    pub fn join(&mut self, id: SessionId, player_name: String) -> Result<&GameSession, GameError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(GameError::SessionNotFound)?;

        let mut rng = ChaCha8Rng::seed_from_u64(rand::random());
        session.admit_player(player_name, &mut rng)?;
        Ok(session)
    }

    pub fn session(&self, id: SessionId) -> Result<&GameSession, GameError> {
        self.sessions.get(&id).ok_or(GameError::SessionNotFound)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Result<&mut GameSession, GameError> {
        self.sessions.get_mut(&id).ok_or(GameError::SessionNotFound)
    }

    /// Sessions still waiting for a second player, in creation order.
    /// This is the public matchmaking lobby view.
    pub fn open_sessions(&self) -> Vec<OpenSession> {
        self.order
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .filter(|s| s.phase == SessionPhase::WaitingForPlayer)
            .map(|s| OpenSession {
                id: s.id,
                player_one: s.seat(PlayerSlot::One).name.clone(),
                created_at: s.created_at,
            })
            .collect()
    }

    /// Bind a connection to the seat whose display name matches, keeping the
    /// binding table and the seat's connection reference in step
    pub fn bind_connection(
        &mut self,
        connection: ConnectionId,
        id: SessionId,
        player_name: &str,
    ) -> Result<PlayerSlot, GameError> {
        // A connection switching to another session releases its old seat
        if let Some((old_id, old_slot)) = self.bindings.get(&connection).copied() {
            if old_id != id {
                if let Some(old) = self.sessions.get_mut(&old_id) {
                    if old.seat(old_slot).connection == Some(connection) {
                        old.seat_mut(old_slot).connection = None;
                    }
                }
            }
        }

        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(GameError::SessionNotFound)?;
        let slot = session.bind_player(player_name, connection)?;

        // A reconnect displaces the seat's previous connection
        self.bindings
            .retain(|c, b| *b != (id, slot) || *c == connection);
        self.bindings.insert(connection, (id, slot));
        Ok(slot)
    }

    pub fn binding(&self, connection: ConnectionId) -> Option<(SessionId, PlayerSlot)> {
        self.bindings.get(&connection).copied()
    }

    /// Drop a connection's binding and clear the seat reference it held
    pub fn unbind(&mut self, connection: ConnectionId) -> Option<(SessionId, PlayerSlot)> {
        let (id, slot) = self.bindings.remove(&connection)?;
        if let Some(session) = self.sessions.get_mut(&id) {
            if session.seat(slot).connection == Some(connection) {
                session.seat_mut(slot).connection = None;
            }
        }
        Some((id, slot))
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.sessions.len(),
            waiting: 0,
            in_progress: 0,
        };
        for session in self.sessions.values() {
            match session.phase {
                SessionPhase::WaitingForPlayer => stats.waiting += 1,
                SessionPhase::InProgress => stats.in_progress += 1,
                SessionPhase::Finished => {}
            }
        }
        stats
    }
}

/// Bounded table of match sessions behind one exclusive lock.
///
/// Every read and write of the table, of any session's mutable fields, and
/// of the connection bindings goes through this lock. Critical sections are
/// compute-bound; network sends happen after release.
pub struct SessionStore {
    inner: Mutex<SessionTable>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(SessionTable::new(capacity)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.inner.lock()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}
