//! Request and response bodies for the HTTP and WebSocket surfaces.

use super::{Card, Money, PatternKind, Phase, PlayerId, SessionId, Stake};
use serde::{Deserialize, Serialize};

/// A loosely typed request parameter: clients send ids as numbers or strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Int(i64),
    Text(String),
}

impl Param {
    /// Interpret as a non-negative integer. Text must be all digits.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Param::Int(v) if *v >= 0 => Some(*v),
            Param::Int(_) => None,
            Param::Text(s) => {
                let s = s.trim();
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                s.parse().ok()
            }
        }
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

/// What a select request asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Preview,
    Accept,
    Cancel,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelectRequest {
    pub tid: Option<Param>,
    pub stake: Option<Param>,
    pub index: Option<Param>,
    #[serde(default)]
    pub action: Intent,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub tid: Option<Param>,
    pub stake: Option<Param>,
    #[serde(default)]
    pub picks: Option<Vec<Param>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AbandonRequest {
    pub tid: Option<Param>,
    pub stake: Option<Param>,
}

/// Query string of the state endpoints.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateQuery {
    pub stake: Option<String>,
    pub tid: Option<String>,
}

/// Convert a client pick list into ball numbers, skipping anything unusable.
pub fn parse_picks(picks: &[Param]) -> Vec<u8> {
    picks
        .iter()
        .filter_map(Param::as_int)
        .filter_map(|v| u8::try_from(v).ok())
        .collect()
}

/// Full view of a stake's current session as seen by one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    pub ok: bool,
    pub stake: Stake,
    pub game_id: SessionId,
    pub phase: Phase,
    pub total_games: u64,
    pub players: u32,
    pub taken: Vec<u16>,
    pub accepted_count: u32,
    pub countdown_started_at: Option<u64>,
    pub countdown_remaining: Option<u64>,
    pub started_at: Option<u64>,
    pub started: bool,
    pub current_call: Option<u8>,
    pub recent_calls: Vec<u8>,
    pub call_count: usize,
    pub called_numbers: Vec<u8>,
    pub my_index: Option<u16>,
    pub my_card: Option<Card>,
    pub online: u32,
    pub winner: Option<WinnerNotice>,
    pub server_time: u64,
}

/// Read-only summary of a stake, without presence or transitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeStatus {
    pub ok: bool,
    pub stake: Stake,
    pub game_id: SessionId,
    pub phase: Phase,
    pub players: u32,
    pub accepted_count: u32,
    pub countdown_started_at: Option<u64>,
    pub started_at: Option<u64>,
    pub server_time: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionView {
    pub ok: bool,
    pub game_id: SessionId,
    pub index: Option<u16>,
    pub accepted: bool,
    pub taken: Vec<u16>,
    pub accepted_count: u32,
    pub countdown_started_at: Option<u64>,
    pub biased: bool,
    pub card: Option<Card>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbandonView {
    pub ok: bool,
    pub released: bool,
    pub taken: Vec<u16>,
    pub accepted_count: u32,
}

/// Who won a session and how.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerNotice {
    pub winner: String,
    pub player: PlayerId,
    pub index: u16,
    pub pattern: PatternKind,
    pub row: Option<u8>,
    pub col: Option<u8>,
    pub picks: Option<Vec<u8>>,
    pub amount: Money,
}

/// Body returned for a claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimResponse {
    Won {
        ok: bool,
        pattern: PatternKind,
        row: Option<u8>,
        col: Option<u8>,
        index: u16,
        player: String,
        amount: Money,
    },
    NotBingo {
        ok: bool,
        reason: String,
        disqualified: bool,
    },
}

/// Error body shared by every endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub ok: bool,
    pub reason: String,
    pub error: String,
}

/// Events pushed to every subscriber of a stake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Broadcast {
    CallSync { started_at: u64, server_time: u64 },
    Winner(WinnerNotice),
    Restarted { game_id: SessionId },
    Finished { game_id: SessionId },
}

impl Broadcast {
    pub fn name(&self) -> &'static str {
        match self {
            Broadcast::CallSync { .. } => "call_sync",
            Broadcast::Winner(_) => "winner",
            Broadcast::Restarted { .. } => "restarted",
            Broadcast::Finished { .. } => "finished",
        }
    }
}

/// Messages sent to a single WebSocket client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Pong,
    Disqualified { reason: String },
    Rejected { reason: String },
}

/// Messages a WebSocket client may send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    Ping,
    ClaimBingo {
        tid: Param,
        #[serde(default)]
        picks: Option<Vec<Param>>,
    },
}
