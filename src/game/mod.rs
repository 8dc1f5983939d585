//! Game domain - board engine, session state machine, session store

pub mod board;
pub mod error;
pub mod session;
pub mod store;

pub use error::GameError;
pub use session::{ConnectionId, GameSession, PlayerSlot, SessionId, SessionPhase};
pub use store::{SessionStore, DEFAULT_MAX_SESSIONS};
