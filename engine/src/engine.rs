use crate::{
    sequence, validator, Cache, Clock, Error, Hub, KeyedLocks, MemoryCache, MemoryStore,
    MemoryWallet, Result, Settings, Store, Wallet,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tombola_types::{
    api::{Broadcast, StakeStatus, StateView, WinnerNotice},
    Card, GameSession, Phase, PlayerId, SessionId, Stake,
};
use tracing::{info, warn};

/// Outcome of a claim that reached validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    Won(WinnerNotice),
    /// No pattern matched; the claimant's card was removed.
    NotBingo,
}

/// Engine wired to the in-process collaborators.
pub type MemoryEngine = Engine<MemoryStore, MemoryWallet, MemoryCache>;

/// Session engine for every stake. Cheap to clone.
pub struct Engine<S, W, C> {
    pub(crate) store: Arc<S>,
    pub(crate) wallet: Arc<W>,
    pub(crate) cache: Arc<C>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) hub: Hub,
    pub(crate) session_locks: Arc<KeyedLocks<SessionId>>,
    pub(crate) stake_locks: Arc<KeyedLocks<Stake>>,
    pub(crate) settings: Arc<Settings>,
}

impl<S, W, C> Clone for Engine<S, W, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            wallet: self.wallet.clone(),
            cache: self.cache.clone(),
            clock: self.clock.clone(),
            hub: self.hub.clone(),
            session_locks: self.session_locks.clone(),
            stake_locks: self.stake_locks.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: Store, W: Wallet, C: Cache> Engine<S, W, C> {
    pub fn new(
        store: S,
        wallet: W,
        cache: C,
        clock: Arc<dyn Clock>,
        hub: Hub,
        settings: Settings,
    ) -> Self {
        Self {
            store: Arc::new(store),
            wallet: Arc::new(wallet),
            cache: Arc::new(cache),
            clock,
            hub,
            session_locks: Arc::new(KeyedLocks::new()),
            stake_locks: Arc::new(KeyedLocks::new()),
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn subscribe(&self, stake: Stake) -> broadcast::Receiver<Broadcast> {
        self.hub.subscribe(stake)
    }

    /// Validate a claim against the current session of `stake`.
    ///
    /// A privileged player's picks are tried first, then the called numbers.
    /// When nothing matches the claimant is disqualified. A match is paid out
    /// exactly once; concurrent duplicates get [Error::AlreadyWon].
    pub async fn claim_bingo(
        &self,
        player: PlayerId,
        stake: Stake,
        picks: Option<Vec<u8>>,
    ) -> Result<ClaimOutcome> {
        let account = self
            .wallet
            .player(player)
            .await
            .ok_or(Error::NotFound(player))?;
        let session = self.advance(stake).await?;
        match session.phase() {
            Phase::Running { .. } => {}
            Phase::Finished if session.winner.is_some() => return Err(Error::AlreadyWon),
            Phase::Finished => return Err(crate::Conflict::SessionFinished.into()),
            Phase::Open | Phase::Countdown { .. } => return Err(Error::NotStarted),
        }
        let selection = self
            .store
            .selection(session.id, player)
            .await
            .filter(|s| s.accepted)
            .ok_or(Error::NoCard)?;

        let card = Card::generate(selection.index as i64);
        let called = sequence::calls(&session, self.now(), self.settings.call_interval_ms());
        let privileged = self.settings.privileged == Some(player);
        let pattern = picks
            .as_deref()
            .filter(|p| privileged && !p.is_empty())
            .and_then(|p| validator::validate(&card, &validator::Marks::new(p)))
            .or_else(|| validator::validate(&card, &validator::Marks::new(&called.called)));

        let Some(pattern) = pattern else {
            self.store.disqualify(session.id, player).await;
            info!(
                stake,
                session = session.id,
                player = %player,
                index = selection.index,
                calls = called.count,
                "disqualified"
            );
            return Ok(ClaimOutcome::NotBingo);
        };

        let amount = self.finalize(session.id, &account).await?;
        let notice = WinnerNotice {
            winner: account.display_name(),
            player,
            index: selection.index,
            pattern: pattern.kind(),
            row: pattern.row(),
            col: pattern.col(),
            picks,
            amount,
        };
        info!(
            stake,
            session = session.id,
            player = %player,
            index = selection.index,
            pattern = ?pattern,
            %amount,
            "bingo"
        );
        self.hub.publish(stake, Broadcast::Winner(notice.clone()));
        self.remember_winner(stake, &notice).await;
        self.schedule_restart(stake).await;
        Ok(ClaimOutcome::Won(notice))
    }

    /// Full state for `stake`, driving any due transitions first.
    pub async fn state(&self, stake: Stake, player: Option<PlayerId>) -> Result<StateView> {
        if let Some(player) = player {
            self.heartbeat(player).await;
        }
        let session = self.current(stake).await?;
        if session.phase().is_open() {
            self.reap(&session).await;
        }
        let session = self.advance(stake).await?;
        self.view(&session, player).await
    }

    /// Summary of `stake` without heartbeat, reaping or timed transitions.
    ///
    /// A finished session is reported as is, never replaced. Only the very
    /// first query of a stake creates its session.
    pub async fn stake_status(&self, stake: Stake) -> Result<StakeStatus> {
        let session = match self.store.current_session(stake).await {
            Some(session) => session,
            None => self.current(stake).await?,
        };
        let accepted = self.store.accepted(session.id).await.len() as u32;
        Ok(StakeStatus {
            ok: true,
            stake,
            game_id: session.id,
            phase: session.phase(),
            players: players_display(&session, accepted),
            accepted_count: accepted,
            countdown_started_at: session.countdown_started_at,
            started_at: session.run_started_at,
            server_time: self.now(),
        })
    }

    async fn view(&self, session: &GameSession, player: Option<PlayerId>) -> Result<StateView> {
        let now = self.now();
        let accepted = self.store.accepted(session.id).await;
        let mut taken: Vec<u16> = accepted.iter().map(|s| s.index).collect();
        taken.sort_unstable();
        let players = players_display(session, accepted.len() as u32);
        let countdown_remaining = match session.phase() {
            Phase::Countdown { since } => {
                let elapsed = now.saturating_sub(since) / 1_000;
                Some(self.settings.countdown.as_secs().saturating_sub(elapsed))
            }
            _ => None,
        };
        let calls = sequence::calls(session, now, self.settings.call_interval_ms());
        let mine = match player {
            Some(player) => self
                .store
                .selection(session.id, player)
                .await
                .filter(|s| s.accepted),
            None => None,
        };
        Ok(StateView {
            ok: true,
            stake: session.stake,
            game_id: session.id,
            phase: session.phase(),
            total_games: self.store.started_count().await,
            players,
            taken,
            accepted_count: players,
            countdown_started_at: session.countdown_started_at,
            countdown_remaining,
            started_at: session.run_started_at,
            started: session.run_started_at.is_some(),
            current_call: calls.current,
            recent_calls: calls.recent,
            call_count: calls.count,
            called_numbers: calls.called,
            my_index: mine.as_ref().map(|s| s.index),
            my_card: mine.map(|s| Card::generate(s.index as i64)),
            online: self.online(session).await,
            winner: self.recent_winner(session.stake).await,
            server_time: now,
        })
    }

    async fn remember_winner(&self, stake: Stake, notice: &WinnerNotice) {
        match serde_json::to_string(notice) {
            Ok(encoded) => {
                self.cache
                    .set(
                        &winner_key(stake),
                        encoded,
                        self.settings.winner_display,
                    )
                    .await
            }
            Err(e) => warn!(stake, error = %e, "failed to encode winner"),
        }
    }

    async fn recent_winner(&self, stake: Stake) -> Option<WinnerNotice> {
        let encoded = self.cache.get(&winner_key(stake)).await?;
        serde_json::from_str(&encoded).ok()
    }
}

/// Participants shown to clients: the charged snapshot once charged.
fn players_display(session: &GameSession, accepted: u32) -> u32 {
    if session.charged {
        session.charged_count
    } else {
        accepted
    }
}

fn winner_key(stake: Stake) -> String {
    format!("winner:{stake}")
}
