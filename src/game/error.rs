//! Error taxonomy shared by the control plane and the push channel

/// Rejection reasons surfaced uniformly across both transports.
///
/// The HTTP layer maps these to status codes; the push channel maps them
/// to `error` frames carrying the stable `code()` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("session not found")]
    SessionNotFound,

    #[error("session table is full")]
    CapacityExceeded,

    #[error("session is not waiting for a second player")]
    NotJoinable,

    #[error("player name does not belong to this session")]
    UnknownPlayer,

    #[error("connection is not bound to a player slot in this session")]
    NotBound,

    #[error("session is not in progress")]
    NotInProgress,

    #[error("it is not this player's turn")]
    OutOfTurn,

    #[error("coordinates are outside the board")]
    OutOfBounds,

    #[error("cell has already been attacked")]
    CellAlreadyResolved,

    #[error("player name must not be empty")]
    InvalidPlayerName,
}

impl GameError {
    /// Stable machine-readable code for wire error frames
    pub fn code(&self) -> &'static str {
        match self {
            GameError::SessionNotFound => "session_not_found",
            GameError::CapacityExceeded => "capacity_exceeded",
            GameError::NotJoinable => "not_joinable",
            GameError::UnknownPlayer => "unknown_player",
            GameError::NotBound => "not_bound",
            GameError::NotInProgress => "not_in_progress",
            GameError::OutOfTurn => "out_of_turn",
            GameError::OutOfBounds => "out_of_bounds",
            GameError::CellAlreadyResolved => "cell_already_resolved",
            GameError::InvalidPlayerName => "invalid_player_name",
        }
    }
}
