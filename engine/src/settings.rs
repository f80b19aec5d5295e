use std::time::Duration;
use tombola_types::PlayerId;

/// Timing and payout parameters of the session engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Time between the second accepted card and the first call.
    pub countdown: Duration,
    /// Time between consecutive calls.
    pub call_interval: Duration,
    /// How long a won session stays current before it is replaced.
    pub restart_delay: Duration,
    /// Accepted cards of players unseen for this long are released while open.
    pub presence_stale: Duration,
    /// Expiry of a heartbeat entry.
    pub presence_ttl: Duration,
    /// Minimum spacing of reaper passes per session.
    pub reap_interval: Duration,
    /// How long the last winner is echoed in state queries.
    pub winner_display: Duration,
    /// Accepted cards needed to start the countdown.
    pub min_players: u32,
    /// Share of the stake pool kept by the house.
    pub house_edge_percent: u32,
    /// Player whose accepted card is drawn first and whose picks are honored.
    pub privileged: Option<PlayerId>,
    /// Buffered events per stake topic.
    pub topic_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(30),
            call_interval: Duration::from_secs(3),
            restart_delay: Duration::from_secs(5),
            presence_stale: Duration::from_secs(15),
            presence_ttl: Duration::from_secs(120),
            reap_interval: Duration::from_secs(3),
            winner_display: Duration::from_secs(10),
            min_players: 2,
            house_edge_percent: 20,
            privileged: None,
            topic_capacity: 1024,
        }
    }
}

impl Settings {
    /// Percentage of the stake pool paid to the winner.
    pub fn payout_percent(&self) -> u32 {
        100u32.saturating_sub(self.house_edge_percent)
    }

    pub(crate) fn call_interval_ms(&self) -> u64 {
        (self.call_interval.as_millis() as u64).max(1)
    }
}
