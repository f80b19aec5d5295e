use super::{Money, SessionId};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Stable external identity of a player (the chat platform's numeric id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid player id: {0:?}")]
pub struct InvalidPlayerId(pub String);

impl FromStr for PlayerId {
    type Err = InvalidPlayerId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidPlayerId(s.to_string()));
        }
        trimmed
            .parse()
            .map(PlayerId)
            .map_err(|_| InvalidPlayerId(s.to_string()))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account state the engine reads and mutates through the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub username: Option<String>,
    pub wallet: Money,
    #[serde(default)]
    pub bonus: Money,
    #[serde(default)]
    pub wins: u32,
}

impl Player {
    pub fn new(id: PlayerId, username: Option<String>, wallet: Money) -> Self {
        Self {
            id,
            username,
            wallet,
            bonus: Money::ZERO,
            wins: 0,
        }
    }

    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Player {}", self.id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Stake taken when a run begins.
    Stake,
    /// Pot paid to a winner.
    Win,
    /// Stake taken at payout from a player who was never charged.
    Settlement,
}

/// A requested wallet mutation. `key` makes it idempotent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Posting {
    pub key: String,
    pub kind: LedgerKind,
    pub player: PlayerId,
    pub amount: Money,
    pub note: String,
}

impl Posting {
    pub fn stake(session: SessionId, player: PlayerId, amount: Money, stake: u32) -> Self {
        Self {
            key: format!("stake:{session}:{player}"),
            kind: LedgerKind::Stake,
            player,
            amount,
            note: format!("Stake {stake} for game {session}"),
        }
    }

    pub fn win(session: SessionId, player: PlayerId, amount: Money, stake: u32) -> Self {
        Self {
            key: format!("win:{session}"),
            kind: LedgerKind::Win,
            player,
            amount,
            note: format!("Won {amount} in stake {stake} game {session}"),
        }
    }

    pub fn settle(session: SessionId, player: PlayerId, amount: Money, stake: u32) -> Self {
        Self {
            key: format!("settle:{session}:{player}"),
            kind: LedgerKind::Settlement,
            player,
            amount,
            note: format!("Lost stake {stake} in game {session}"),
        }
    }
}

/// Append-only record of a wallet mutation. `amount` is signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub key: String,
    pub kind: LedgerKind,
    pub player: PlayerId,
    pub amount: Money,
    pub note: String,
    pub at: u64,
}
