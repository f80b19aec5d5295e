//! Shared data model for tombola bingo sessions.
//!
//! Nothing in this crate performs I/O: it defines cards, money, sessions,
//! players and the messages exchanged with clients.

pub mod api;
mod card;
mod constants;
mod money;
mod pattern;
mod player;
mod session;

pub use card::{clamp_index, Card, Cell};
pub use constants::*;
pub use money::{Money, MoneyError, SCALE};
pub use pattern::{Pattern, PatternKind};
pub use player::{InvalidPlayerId, LedgerEntry, LedgerKind, Player, PlayerId, Posting};
pub use session::{GameSession, Phase, Selection, SessionId, Stake};

#[cfg(test)]
mod tests;
