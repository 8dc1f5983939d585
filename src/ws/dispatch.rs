//! Realtime protocol handler - interprets push-channel frames
//!
//! Every handler acquires the session store lock once, mutates state, and
//! captures the complete set of outbound frames (the outbox) before the
//! lock is released. Delivery happens afterwards and depends on no shared
//! state, so a competing attack acquiring the lock mid-delivery cannot
//! reorder or corrupt what was already decided.

use tracing::{debug, info};

use crate::app::AppState;
use crate::game::{ConnectionId, GameError, SessionId, SessionPhase};
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::registry::Outbox;

/// Interpret one inbound frame and compute the frames it produces
pub fn handle_message(state: &AppState, connection: ConnectionId, msg: ClientMsg) -> Outbox {
    match msg {
        ClientMsg::Join {
            session_id,
            player_name,
        } => handle_join(state, connection, session_id, &player_name),
        ClientMsg::Attack { session_id, x, y } => handle_attack(state, connection, session_id, x, y),
        ClientMsg::Leave { session_id } => handle_leave(state, connection, session_id),
    }
}

/// Bind the connection to its seat and push a full snapshot to it.
///
/// A join for a session already InProgress is the reconnect path and is
/// accepted; rebinding overwrites the stored connection reference.
fn handle_join(
    state: &AppState,
    connection: ConnectionId,
    session_id: SessionId,
    player_name: &str,
) -> Outbox {
    let mut table = state.sessions.lock();

    let slot = match table.bind_connection(connection, session_id, player_name) {
        Ok(slot) => slot,
        Err(err) => {
            debug!(
                connection_id = %connection,
                session_id = %session_id,
                error = %err,
                "Rejected push-channel join"
            );
            return vec![(connection, ServerMsg::error(err))];
        }
    };

    info!(
        session_id = %session_id,
        player = slot.number(),
        connection_id = %connection,
        "Connection bound to player slot"
    );

    match table.session(session_id) {
        Ok(session) => vec![(connection, session.state_msg(slot))],
        Err(err) => vec![(connection, ServerMsg::error(err))],
    }
}

/// Run turn arbitration and attack resolution, then decide the broadcast:
/// a terminal result to both players when the match ended, otherwise a
/// fresh oriented snapshot to each bound connection.
fn handle_attack(
    state: &AppState,
    connection: ConnectionId,
    session_id: SessionId,
    x: i32,
    y: i32,
) -> Outbox {
    let mut table = state.sessions.lock();

    // Attacks are legal only from a connection bound to this session
    let slot = match table.binding(connection) {
        Some((bound, slot)) if bound == session_id => slot,
        _ => return vec![(connection, ServerMsg::error(GameError::NotBound))],
    };

    let session = match table.session_mut(session_id) {
        Ok(session) => session,
        Err(err) => return vec![(connection, ServerMsg::error(err))],
    };

    let report = match session.attack(slot, x, y) {
        Ok(report) => report,
        Err(err) => {
            debug!(
                session_id = %session_id,
                player = slot.number(),
                x,
                y,
                error = %err,
                "Rejected attack"
            );
            return vec![(connection, ServerMsg::error(err))];
        }
    };

    let recipients = session.bound_connections();
    if report.game_over {
        info!(
            session_id = %session_id,
            winner = report.next_player,
            "Match finished"
        );
        recipients
            .into_iter()
            .map(|(_, conn)| {
                (
                    conn,
                    ServerMsg::AttackResult {
                        x: report.x,
                        y: report.y,
                        hit: report.hit,
                        sunk: report.sunk,
                        game_over: true,
                        next_player: report.next_player,
                    },
                )
            })
            .collect()
    } else {
        recipients
            .into_iter()
            .map(|(seat, conn)| (conn, session.state_msg(seat)))
            .collect()
    }
}

/// Finish the session and notify the remaining player
fn handle_leave(state: &AppState, connection: ConnectionId, session_id: SessionId) -> Outbox {
    let mut table = state.sessions.lock();

    let slot = match table.binding(connection) {
        Some((bound, slot)) if bound == session_id => slot,
        _ => return vec![(connection, ServerMsg::error(GameError::NotBound))],
    };

    let peer = match table.session_mut(session_id) {
        Ok(session) => {
            session.mark_finished();
            session.seat(slot.opponent()).connection
        }
        Err(err) => return vec![(connection, ServerMsg::error(err))],
    };

    table.unbind(connection);

    info!(
        session_id = %session_id,
        player = slot.number(),
        "Player left the match"
    );

    peer.map(|conn| (conn, ServerMsg::PlayerLeft))
        .into_iter()
        .collect()
}

/// Transport-level disconnect: clear the binding via table lookup and tell
/// the peer. Whether the session is also finished is the configured
/// disconnect policy; an explicit `leave` frame always finishes it.
pub fn handle_disconnect(state: &AppState, connection: ConnectionId) -> Outbox {
    let mut table = state.sessions.lock();

    let Some((session_id, slot)) = table.unbind(connection) else {
        return Vec::new();
    };

    info!(
        session_id = %session_id,
        player = slot.number(),
        connection_id = %connection,
        "Connection dropped"
    );

    match table.session_mut(session_id) {
        Ok(session) => {
            if state.config.finish_on_disconnect && session.phase == SessionPhase::InProgress {
                session.mark_finished();
            }
            session
                .seat(slot.opponent())
                .connection
                .map(|peer| (peer, ServerMsg::PlayerLeft))
                .into_iter()
                .collect()
        }
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::board::{CellState, BOARD_SIZE};
    use crate::game::{PlayerSlot, SessionStore};
    use crate::ws::registry::ConnectionRegistry;
    use std::sync::Arc;
    use uuid::Uuid;

    fn test_state(finish_on_disconnect: bool) -> AppState {
        let mut config = Config::for_tests();
        config.finish_on_disconnect = finish_on_disconnect;
        AppState {
            config: Arc::new(config),
            sessions: Arc::new(SessionStore::new(100)),
            connections: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Create Alice vs Bob, both connections bound, match in progress
    fn started_match(state: &AppState) -> (SessionId, ConnectionId, ConnectionId) {
        let id = {
            let mut table = state.sessions.lock();
            let id = table.create("Alice".to_string()).unwrap().id;
            table.join(id, "Bob".to_string()).unwrap();
            id
        };

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for (conn, name) in [(alice, "Alice"), (bob, "Bob")] {
            let outbox = handle_message(
                state,
                conn,
                ClientMsg::Join {
                    session_id: id,
                    player_name: name.to_string(),
                },
            );
            assert_eq!(outbox.len(), 1);
            assert_eq!(outbox[0].0, conn);
            assert!(matches!(outbox[0].1, ServerMsg::GameState { .. }));
        }

        (id, alice, bob)
    }

    fn find_cell(state: &AppState, id: SessionId, slot: PlayerSlot, want: CellState) -> (i32, i32) {
        let table = state.sessions.lock();
        let board = &table.session(id).unwrap().seat(slot).board;
        for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                if board.cell(x, y) == want {
                    return (x as i32, y as i32);
                }
            }
        }
        panic!("no {want:?} cell");
    }

    #[test]
    fn join_unknown_session_yields_error_frame() {
        let state = test_state(false);
        let conn = Uuid::new_v4();
        let outbox = handle_message(
            &state,
            conn,
            ClientMsg::Join {
                session_id: Uuid::new_v4(),
                player_name: "Alice".to_string(),
            },
        );

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, conn);
        assert!(
            matches!(&outbox[0].1, ServerMsg::Error { code, .. } if code == "session_not_found")
        );
    }

    #[test]
    fn join_snapshot_is_oriented_and_redacted() {
        let state = test_state(false);
        let (id, _alice, bob) = started_match(&state);

        // Bob reconnects; his snapshot shows his own fleet but none of Alice's
        let bob2 = Uuid::new_v4();
        let outbox = handle_message(
            &state,
            bob2,
            ClientMsg::Join {
                session_id: id,
                player_name: "Bob".to_string(),
            },
        );

        let ServerMsg::GameState {
            player_board,
            enemy_board,
            current_player,
            your_player_number,
        } = &outbox[0].1
        else {
            panic!("expected game_state");
        };

        assert_eq!(*your_player_number, 2);
        assert_eq!(*current_player, 1);
        let own_ship_cells: usize = player_board
            .cells
            .iter()
            .flatten()
            .filter(|c| **c == CellState::Ship.as_wire())
            .count();
        assert_eq!(own_ship_cells, 20);
        assert!(enemy_board
            .cells
            .iter()
            .flatten()
            .all(|c| *c != CellState::Ship.as_wire()));

        // The rebind displaced Bob's previous connection
        let table = state.sessions.lock();
        assert_eq!(table.binding(bob), None);
        assert_eq!(table.binding(bob2), Some((id, PlayerSlot::Two)));
    }

    #[test]
    fn out_of_turn_attack_is_rejected_to_sender_only() {
        let state = test_state(false);
        let (id, _alice, bob) = started_match(&state);

        let outbox = handle_message(
            &state,
            bob,
            ClientMsg::Attack {
                session_id: id,
                x: 0,
                y: 0,
            },
        );

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].0, bob);
        assert!(matches!(&outbox[0].1, ServerMsg::Error { code, .. } if code == "out_of_turn"));

        let table = state.sessions.lock();
        assert_eq!(table.session(id).unwrap().current_player, PlayerSlot::One);
    }

    #[test]
    fn unbound_connection_cannot_attack() {
        let state = test_state(false);
        let (id, ..) = started_match(&state);

        let stranger = Uuid::new_v4();
        let outbox = handle_message(
            &state,
            stranger,
            ClientMsg::Attack {
                session_id: id,
                x: 0,
                y: 0,
            },
        );
        assert!(matches!(&outbox[0].1, ServerMsg::Error { code, .. } if code == "not_bound"));
    }

    #[test]
    fn hit_keeps_turn_and_miss_passes_it() {
        let state = test_state(false);
        let (id, alice, bob) = started_match(&state);

        let (hx, hy) = find_cell(&state, id, PlayerSlot::Two, CellState::Ship);
        let outbox = handle_message(
            &state,
            alice,
            ClientMsg::Attack {
                session_id: id,
                x: hx,
                y: hy,
            },
        );

        // Both players get a fresh snapshot; the turn stays with Alice
        assert_eq!(outbox.len(), 2);
        for (conn, msg) in &outbox {
            assert!([alice, bob].contains(conn));
            let ServerMsg::GameState { current_player, .. } = msg else {
                panic!("expected game_state");
            };
            assert_eq!(*current_player, 1);
        }

        let (mx, my) = find_cell(&state, id, PlayerSlot::Two, CellState::Empty);
        let outbox = handle_message(
            &state,
            alice,
            ClientMsg::Attack {
                session_id: id,
                x: mx,
                y: my,
            },
        );
        for (_, msg) in &outbox {
            let ServerMsg::GameState { current_player, .. } = msg else {
                panic!("expected game_state");
            };
            assert_eq!(*current_player, 2);
        }
    }

    #[test]
    fn repeat_attack_on_resolved_cell_is_rejected() {
        let state = test_state(false);
        let (id, alice, _bob) = started_match(&state);

        let (hx, hy) = find_cell(&state, id, PlayerSlot::Two, CellState::Ship);
        handle_message(
            &state,
            alice,
            ClientMsg::Attack {
                session_id: id,
                x: hx,
                y: hy,
            },
        );
        let outbox = handle_message(
            &state,
            alice,
            ClientMsg::Attack {
                session_id: id,
                x: hx,
                y: hy,
            },
        );

        assert_eq!(outbox.len(), 1);
        assert!(
            matches!(&outbox[0].1, ServerMsg::Error { code, .. } if code == "cell_already_resolved")
        );
    }

    #[test]
    fn defeating_the_fleet_broadcasts_a_terminal_result() {
        let state = test_state(false);
        let (id, alice, bob) = started_match(&state);

        let ship_points: Vec<(i32, i32)> = {
            let table = state.sessions.lock();
            table
                .session(id)
                .unwrap()
                .seat(PlayerSlot::Two)
                .board
                .ships()
                .iter()
                .flat_map(|s| s.points.iter().map(|p| (p.x as i32, p.y as i32)))
                .collect()
        };

        let mut last = Vec::new();
        for (x, y) in ship_points {
            last = handle_message(
                &state,
                alice,
                ClientMsg::Attack {
                    session_id: id,
                    x,
                    y,
                },
            );
        }

        assert_eq!(last.len(), 2);
        for (conn, msg) in &last {
            assert!([alice, bob].contains(conn));
            let ServerMsg::AttackResult {
                game_over,
                next_player,
                hit,
                ..
            } = msg
            else {
                panic!("expected attack_result");
            };
            assert!(*game_over);
            assert!(*hit);
            assert_eq!(*next_player, 1, "winner holds the turn");
        }

        let table = state.sessions.lock();
        assert_eq!(table.session(id).unwrap().phase, SessionPhase::Finished);
        drop(table);

        // Finished sessions reject further attacks
        let outbox = handle_message(
            &state,
            alice,
            ClientMsg::Attack {
                session_id: id,
                x: 0,
                y: 0,
            },
        );
        assert!(matches!(&outbox[0].1, ServerMsg::Error { code, .. } if code == "not_in_progress"));
    }

    #[test]
    fn leave_finishes_session_and_notifies_peer() {
        let state = test_state(false);
        let (id, alice, bob) = started_match(&state);

        let outbox = handle_message(&state, bob, ClientMsg::Leave { session_id: id });
        assert_eq!(outbox, vec![(alice, ServerMsg::PlayerLeft)]);

        let table = state.sessions.lock();
        assert_eq!(table.session(id).unwrap().phase, SessionPhase::Finished);
        assert_eq!(table.binding(bob), None);
    }

    #[test]
    fn disconnect_notifies_peer_without_finishing_by_default() {
        let state = test_state(false);
        let (id, alice, bob) = started_match(&state);

        let outbox = handle_disconnect(&state, bob);
        assert_eq!(outbox, vec![(alice, ServerMsg::PlayerLeft)]);

        let table = state.sessions.lock();
        let session = table.session(id).unwrap();
        assert_eq!(session.phase, SessionPhase::InProgress);
        assert_eq!(session.seat(PlayerSlot::Two).connection, None);
    }

    #[test]
    fn disconnect_finishes_session_under_the_strict_policy() {
        let state = test_state(true);
        let (id, _alice, bob) = started_match(&state);

        handle_disconnect(&state, bob);

        let table = state.sessions.lock();
        assert_eq!(table.session(id).unwrap().phase, SessionPhase::Finished);
    }

    #[test]
    fn disconnect_of_unbound_connection_is_a_no_op() {
        let state = test_state(false);
        started_match(&state);
        assert!(handle_disconnect(&state, Uuid::new_v4()).is_empty());
    }
}
