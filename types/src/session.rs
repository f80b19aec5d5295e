use super::PlayerId;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the store when a session is created.
pub type SessionId = u64;

/// Stake tier in whole currency units.
pub type Stake = u32;

/// Lifecycle phase, derived from a session's stored timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Open,
    Countdown { since: u64 },
    Running { since: u64 },
    Finished,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Open => "open",
            Phase::Countdown { .. } => "countdown",
            Phase::Running { .. } => "running",
            Phase::Finished => "finished",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Phase::Open)
    }
}

/// One game at a fixed stake. Timestamps are Unix milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub stake: Stake,
    pub created_at: u64,
    pub countdown_started_at: Option<u64>,
    pub run_started_at: Option<u64>,
    /// Draw order; empty until seeded or the run begins.
    pub sequence: Vec<u8>,
    pub charged: bool,
    pub charged_count: u32,
    pub finished: bool,
    pub finished_at: Option<u64>,
    pub winner: Option<PlayerId>,
}

impl GameSession {
    pub fn new(id: SessionId, stake: Stake, created_at: u64) -> Self {
        Self {
            id,
            stake,
            created_at,
            countdown_started_at: None,
            run_started_at: None,
            sequence: Vec::new(),
            charged: false,
            charged_count: 0,
            finished: false,
            finished_at: None,
            winner: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.finished {
            return Phase::Finished;
        }
        if let Some(since) = self.run_started_at {
            return Phase::Running { since };
        }
        if let Some(since) = self.countdown_started_at {
            return Phase::Countdown { since };
        }
        Phase::Open
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase(), Phase::Running { .. })
    }
}

/// A player's claim on a card index within a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub session: SessionId,
    pub player: PlayerId,
    pub index: u16,
    pub accepted: bool,
    pub created_at: u64,
}
