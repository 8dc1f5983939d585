//! Push-channel protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::board::{Board, CellState};
use crate::game::{GameError, SessionId};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Bind this connection to a player seat in a session
    Join {
        session_id: SessionId,
        player_name: String,
    },

    /// Fire at a cell of the opponent's board
    Attack {
        session_id: SessionId,
        x: i32,
        y: i32,
    },

    /// Abandon the match
    Leave { session_id: SessionId },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full board-state snapshot, oriented to its recipient
    GameState {
        player_board: BoardView,
        enemy_board: BoardView,
        /// Player number (1 or 2) holding the turn
        current_player: u8,
        /// The recipient's own player number
        your_player_number: u8,
    },

    /// Terminal attack outcome; `next_player` identifies the winner
    AttackResult {
        x: i32,
        y: i32,
        hit: bool,
        sunk: bool,
        game_over: bool,
        next_player: u8,
    },

    /// The opponent left or disconnected
    PlayerLeft,

    /// Structured rejection of a client message
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn error(err: GameError) -> Self {
        ServerMsg::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// One board as serialized for a specific viewer.
///
/// Cell encoding: Empty=0, Ship=1, Hit=2, Miss=3. The opponent view maps
/// Ship to Empty and lists only sunk ships, so unstruck fleet positions
/// never cross the wire to the other player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    /// 10 rows of 10 cells, row-major
    pub cells: Vec<Vec<u8>>,
    pub ships: Vec<ShipView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipView {
    pub size: usize,
    pub hits: usize,
    pub points: Vec<PointView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointView {
    pub x: usize,
    pub y: usize,
}

impl BoardView {
    /// The board as its owner sees it: everything in the clear
    pub fn owner(board: &Board) -> Self {
        Self {
            cells: Self::wire_cells(board, false),
            ships: board.ships().iter().map(ShipView::of).collect(),
        }
    }

    /// The board as the opponent sees it: Ship cells read as Empty, and
    /// only sunk ships (already framed by their sink ring) are listed
    pub fn opponent(board: &Board) -> Self {
        Self {
            cells: Self::wire_cells(board, true),
            ships: board
                .ships()
                .iter()
                .filter(|s| s.is_sunk())
                .map(ShipView::of)
                .collect(),
        }
    }

    fn wire_cells(board: &Board, redact: bool) -> Vec<Vec<u8>> {
        board
            .cells()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        CellState::Ship if redact => CellState::Empty.as_wire(),
                        other => other.as_wire(),
                    })
                    .collect()
            })
            .collect()
    }
}

impl ShipView {
    fn of(ship: &crate::game::board::Ship) -> Self {
        Self {
            size: ship.size(),
            hits: ship.hits,
            points: ship
                .points
                .iter()
                .map(|p| PointView { x: p.x, y: p.y })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::Orientation;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn placed_board(seed: u64) -> Board {
        let mut board = Board::new();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        board.place_fleet(&mut rng);
        board
    }

    #[test]
    fn client_frames_parse_as_the_reference_client_sends_them() {
        let id = Uuid::new_v4();

        let msg: ClientMsg = serde_json::from_str(&format!(
            r#"{{"type":"join","session_id":"{id}","player_name":"Alice"}}"#
        ))
        .unwrap();
        assert!(matches!(
            msg,
            ClientMsg::Join { session_id, ref player_name }
                if session_id == id && player_name == "Alice"
        ));

        let msg: ClientMsg = serde_json::from_str(&format!(
            r#"{{"type":"attack","session_id":"{id}","x":4,"y":7}}"#
        ))
        .unwrap();
        assert!(matches!(msg, ClientMsg::Attack { x: 4, y: 7, .. }));

        let msg: ClientMsg =
            serde_json::from_str(&format!(r#"{{"type":"leave","session_id":"{id}"}}"#)).unwrap();
        assert!(matches!(msg, ClientMsg::Leave { .. }));
    }

    #[test]
    fn negative_attack_coordinates_still_parse() {
        let id = Uuid::new_v4();
        let msg: ClientMsg = serde_json::from_str(&format!(
            r#"{{"type":"attack","session_id":"{id}","x":-1,"y":11}}"#
        ))
        .unwrap();
        assert!(matches!(msg, ClientMsg::Attack { x: -1, y: 11, .. }));
    }

    #[test]
    fn server_frames_carry_their_type_tags() {
        let json = serde_json::to_string(&ServerMsg::PlayerLeft).unwrap();
        assert_eq!(json, r#"{"type":"player_left"}"#);

        let json = serde_json::to_string(&ServerMsg::AttackResult {
            x: 3,
            y: 4,
            hit: true,
            sunk: false,
            game_over: true,
            next_player: 1,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "attack_result");
        assert_eq!(value["game_over"], true);
        assert_eq!(value["next_player"], 1);

        let json = serde_json::to_string(&ServerMsg::error(GameError::OutOfTurn)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "out_of_turn");
    }

    #[test]
    fn owner_view_shows_the_fleet() {
        let board = placed_board(11);
        let view = BoardView::owner(&board);

        assert_eq!(view.cells.len(), 10);
        assert!(view.cells.iter().all(|row| row.len() == 10));
        let ship_cells: usize = view
            .cells
            .iter()
            .flatten()
            .filter(|c| **c == CellState::Ship.as_wire())
            .count();
        assert_eq!(ship_cells, 20);
        assert_eq!(view.ships.len(), 10);
    }

    #[test]
    fn opponent_view_never_exposes_ship_cells() {
        let mut board = placed_board(12);
        // Resolve a few attacks so Hit and Miss cells are present too
        let point = board.ships()[0].points[0];
        board.resolve_attack(point.x as i32, point.y as i32).unwrap();

        let view = BoardView::opponent(&board);
        assert!(view
            .cells
            .iter()
            .flatten()
            .all(|c| *c != CellState::Ship.as_wire()));
        // A hit is still distinguishable
        assert_eq!(view.cells[point.y][point.x], CellState::Hit.as_wire());
    }

    #[test]
    fn opponent_view_lists_only_sunk_ships() {
        let mut board = Board::new();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        board.place_fleet(&mut rng);

        assert!(BoardView::opponent(&board).ships.is_empty());

        let single = board
            .ships()
            .iter()
            .find(|s| s.size() == 1)
            .map(|s| s.points[0])
            .unwrap();
        board
            .resolve_attack(single.x as i32, single.y as i32)
            .unwrap();

        let view = BoardView::opponent(&board);
        assert_eq!(view.ships.len(), 1);
        assert_eq!(view.ships[0].size, 1);
        assert_eq!(view.ships[0].hits, 1);
    }

    #[test]
    fn orientation_is_reflected_in_point_order() {
        let mut board = Board::new();
        let mut rng = ChaCha8Rng::seed_from_u64(14);
        board.place_fleet(&mut rng);

        for ship in board.ships().iter().filter(|s| s.size() > 1) {
            let horizontal = ship.orientation == Orientation::Horizontal;
            for pair in ship.points.windows(2) {
                if horizontal {
                    assert_eq!(pair[1].x, pair[0].x + 1);
                    assert_eq!(pair[1].y, pair[0].y);
                } else {
                    assert_eq!(pair[1].x, pair[0].x);
                    assert_eq!(pair[1].y, pair[0].y + 1);
                }
            }
        }
    }
}
