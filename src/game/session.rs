//! Session state and turn arbitration

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::ws::protocol::{BoardView, ServerMsg};

use super::board::{AttackOutcome, Board};
use super::GameError;

/// Opaque session identity. The canonical v4 string form is the wire
/// format: 36 lowercase hex chars with hyphens at positions 8/13/18/23.
pub type SessionId = Uuid;

/// Identity of a live push-channel connection
pub type ConnectionId = Uuid;

/// Which seat a player occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub fn opponent(self) -> Self {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }

    /// Player number as it appears on the wire (1 or 2)
    pub fn number(self) -> u8 {
        match self {
            PlayerSlot::One => 1,
            PlayerSlot::Two => 2,
        }
    }

    fn index(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, second seat still open
    WaitingForPlayer,
    /// Both seats taken, attacks legal
    InProgress,
    /// One board defeated or a player left; terminal
    Finished,
}

/// One player's seat: display name, own board, and the live push-channel
/// binding if that player is currently connected
#[derive(Debug, Clone)]
pub struct PlayerSeat {
    pub name: String,
    pub board: Board,
    pub connection: Option<ConnectionId>,
}

/// Result of one resolved attack, captured for the terminal broadcast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackReport {
    pub x: i32,
    pub y: i32,
    pub hit: bool,
    pub sunk: bool,
    pub game_over: bool,
    /// Side holding the turn after resolution; on game over this is the
    /// winner, since the final hit never passes the turn
    pub next_player: u8,
}

/// One match between two players: both boards, lifecycle, and turn state.
///
/// Each seat's board stores the opponent's attacks against it; player one
/// fires at seat two's board and vice versa. All mutation happens under the
/// session store lock.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub id: SessionId,
    seats: [PlayerSeat; 2],
    pub phase: SessionPhase,
    pub current_player: PlayerSlot,
    pub created_at: DateTime<Utc>,
}

impl GameSession {
    /// Create a session with player one seated and their fleet placed.
    /// Seat two stays empty until `admit_player`.
    pub fn new<R: Rng>(id: SessionId, player_name: String, rng: &mut R) -> Self {
        let mut board_one = Board::new();
        board_one.place_fleet(rng);

        Self {
            id,
            seats: [
                PlayerSeat {
                    name: player_name,
                    board: board_one,
                    connection: None,
                },
                PlayerSeat {
                    name: String::new(),
                    board: Board::new(),
                    connection: None,
                },
            ],
            phase: SessionPhase::WaitingForPlayer,
            current_player: PlayerSlot::One,
            created_at: Utc::now(),
        }
    }

    pub fn seat(&self, slot: PlayerSlot) -> &PlayerSeat {
        &self.seats[slot.index()]
    }

    pub fn seat_mut(&mut self, slot: PlayerSlot) -> &mut PlayerSeat {
        &mut self.seats[slot.index()]
    }

    /// Seat the second player and start the match
    pub fn admit_player<R: Rng>(&mut self, name: String, rng: &mut R) -> Result<(), GameError> {
        if self.phase != SessionPhase::WaitingForPlayer {
            return Err(GameError::NotJoinable);
        }

        let seat = self.seat_mut(PlayerSlot::Two);
        seat.name = name;
        seat.board.place_fleet(rng);
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Bind a live connection to the seat whose display name matches.
    /// Rebinding (reconnect) overwrites the previous connection reference.
    pub fn bind_player(
        &mut self,
        name: &str,
        connection: ConnectionId,
    ) -> Result<PlayerSlot, GameError> {
        let slot = self
            .slot_of(name)
            .ok_or(GameError::UnknownPlayer)?;
        self.seat_mut(slot).connection = Some(connection);
        Ok(slot)
    }

    /// Seat lookup by display name; seat one wins a name collision
    fn slot_of(&self, name: &str) -> Option<PlayerSlot> {
        if !name.is_empty() && self.seat(PlayerSlot::One).name == name {
            Some(PlayerSlot::One)
        } else if !name.is_empty() && self.seat(PlayerSlot::Two).name == name {
            Some(PlayerSlot::Two)
        } else {
            None
        }
    }

    /// Resolve an attack by `shooter` against the opponent's board.
    ///
    /// A hit keeps the turn (and rings out the ship if it sank); a miss
    /// passes it. A defeated target board finishes the session, with the
    /// shooter left holding the turn as the winner.
    pub fn attack(
        &mut self,
        shooter: PlayerSlot,
        x: i32,
        y: i32,
    ) -> Result<AttackReport, GameError> {
        if self.phase != SessionPhase::InProgress {
            return Err(GameError::NotInProgress);
        }
        if shooter != self.current_player {
            return Err(GameError::OutOfTurn);
        }

        let target = &mut self.seats[shooter.opponent().index()].board;
        let outcome = target.resolve_attack(x, y)?;

        let hit;
        let mut sunk = false;
        match outcome {
            AttackOutcome::Hit(_) => {
                hit = true;
                if let Some(index) = target.find_sunk_ship(x as usize, y as usize) {
                    target.ring_out_sunk_ship(index);
                    sunk = true;
                }
            }
            AttackOutcome::Miss => {
                hit = false;
                self.current_player = self.current_player.opponent();
            }
        }

        let game_over = target.is_defeated();
        if game_over {
            self.phase = SessionPhase::Finished;
        }

        Ok(AttackReport {
            x,
            y,
            hit,
            sunk,
            game_over,
            next_player: self.current_player.number(),
        })
    }

    /// Force the session into its terminal state (explicit leave, or the
    /// finish-on-disconnect policy)
    pub fn mark_finished(&mut self) {
        self.phase = SessionPhase::Finished;
    }

    /// Full state snapshot oriented to `recipient`: own board in the clear,
    /// opponent board redacted
    pub fn state_msg(&self, recipient: PlayerSlot) -> ServerMsg {
        ServerMsg::GameState {
            player_board: BoardView::owner(&self.seat(recipient).board),
            enemy_board: BoardView::opponent(&self.seat(recipient.opponent()).board),
            current_player: self.current_player.number(),
            your_player_number: recipient.number(),
        }
    }

    /// Connections currently bound to either seat
    pub fn bound_connections(&self) -> Vec<(PlayerSlot, ConnectionId)> {
        [PlayerSlot::One, PlayerSlot::Two]
            .into_iter()
            .filter_map(|slot| self.seat(slot).connection.map(|c| (slot, c)))
            .collect()
    }
}
