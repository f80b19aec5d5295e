//! Session state machine.
//!
//! Nothing runs on a timer. Every caller derives what is due from the stored
//! timestamps and races to apply it; the store and the per-session lock make
//! each transition happen once.

use crate::{presence, sequence, Cache, Engine, Result, Settings, Store, StoreError, Wallet};
use tombola_types::{api::Broadcast, GameSession, Money, Phase, Posting, Stake, BALLS};
use tracing::{debug, info, warn};

/// Transition a session is ready for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Due {
    Nothing,
    /// Enough accepted cards to start counting down.
    Countdown,
    /// Countdown elapsed.
    Run,
    /// Every number called without a winner.
    Exhausted,
}

/// Decide what `session` needs at `now` given its accepted card count.
pub fn due(session: &GameSession, accepted: usize, now: u64, settings: &Settings) -> Due {
    match session.phase() {
        Phase::Finished => Due::Nothing,
        Phase::Open if accepted >= settings.min_players as usize => Due::Countdown,
        Phase::Open => Due::Nothing,
        Phase::Countdown { since } => {
            if now.saturating_sub(since) >= settings.countdown.as_millis() as u64 {
                Due::Run
            } else {
                Due::Nothing
            }
        }
        // Disqualifications never end a run early
        Phase::Running { .. } => {
            if sequence::call_count(session, now, settings.call_interval_ms()) >= BALLS as usize {
                Due::Exhausted
            } else {
                Due::Nothing
            }
        }
    }
}

impl<S: Store, W: Wallet, C: Cache> Engine<S, W, C> {
    /// Session currently presented for `stake`, replacing it if it is over.
    ///
    /// A won session stays current for the restart delay so clients can show
    /// the winner. Only the caller that creates the replacement broadcasts
    /// `restarted`.
    pub async fn current(&self, stake: Stake) -> Result<GameSession> {
        if let Some(session) = self.store.current_session(stake).await {
            if self.is_live(&session) {
                return Ok(session);
            }
        }

        let _guard = self.stake_locks.lock(stake).await;
        let previous = self.store.current_session(stake).await;
        if let Some(session) = &previous {
            if self.is_live(session) {
                return Ok(session.clone());
            }
        }
        let session = self.store.create_session(stake, self.now()).await;
        match previous {
            Some(old) => {
                let purged = self.store.purge(old.id).await;
                self.session_locks.forget(&old.id);
                self.cache.delete(&presence::stale_check_key(old.id)).await;
                info!(stake, old = old.id, session = session.id, purged, "session restarted");
                self.hub
                    .publish(stake, Broadcast::Restarted { game_id: session.id });
            }
            None => info!(stake, session = session.id, "session created"),
        }
        Ok(session)
    }

    fn is_live(&self, session: &GameSession) -> bool {
        if !session.finished {
            return true;
        }
        match (session.winner, session.finished_at) {
            (Some(_), Some(at)) => {
                self.now() < at.saturating_add(self.settings.restart_delay.as_millis() as u64)
            }
            _ => false,
        }
    }

    /// Apply every transition due for the current session of `stake`.
    pub async fn advance(&self, stake: Stake) -> Result<GameSession> {
        let mut session = self.current(stake).await?;
        loop {
            let accepted = self.store.accepted(session.id).await.len();
            match due(&session, accepted, self.now(), &self.settings) {
                Due::Nothing => return Ok(session),
                Due::Countdown => {
                    session = self.store.start_countdown(session.id, self.now()).await?;
                    if let Some(since) = session.countdown_started_at {
                        info!(stake, session = session.id, accepted, since, "countdown started");
                    }
                }
                Due::Run => session = self.start_run(&session).await?,
                Due::Exhausted => {
                    self.finish_unwon(&session).await?;
                    session = self.current(stake).await?;
                }
            }
        }
    }

    /// Promote to running and charge every accepted player exactly once.
    async fn start_run(&self, session: &GameSession) -> Result<GameSession> {
        let sequence = sequence::shuffled(&mut rand::thread_rng());
        let _guard = self.session_locks.lock(session.id).await;
        let now = self.now();
        let run = self.store.begin_run(session.id, now, sequence).await?;
        if !run.promoted || run.session.charged {
            return Ok(run.session);
        }

        let stake = run.session.stake;
        let amount = Money::from_units(stake as i64);
        let mut total = Money::ZERO;
        for selection in &run.accepted {
            let posting = Posting::stake(run.session.id, selection.player, amount, stake);
            match self.wallet.debit(posting, now).await {
                Ok(taken) => {
                    debug!(stake, session = run.session.id, player = %selection.player, %taken, "stake charged");
                    total += taken;
                }
                Err(e) => warn!(
                    stake,
                    session = run.session.id,
                    player = %selection.player,
                    error = %e,
                    "failed to charge stake"
                ),
            }
        }
        let session = self
            .store
            .mark_charged(run.session.id, run.accepted.len() as u32)
            .await?;
        info!(
            stake,
            session = session.id,
            players = session.charged_count,
            %total,
            "run started"
        );
        self.hub.publish(
            stake,
            Broadcast::CallSync {
                started_at: now,
                server_time: self.now(),
            },
        );
        Ok(session)
    }

    /// Finish without a winner and replace immediately.
    async fn finish_unwon(&self, session: &GameSession) -> Result<()> {
        {
            let _guard = self.session_locks.lock(session.id).await;
            match self.store.finish(session.id, self.now(), None).await {
                Ok(_) => {}
                Err(StoreError::Finished(_)) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
        info!(stake = session.stake, session = session.id, "session exhausted without winner");
        self.hub
            .publish(session.stake, Broadcast::Finished { game_id: session.id });
        self.current(session.stake).await?;
        Ok(())
    }

    /// Create the replacement of a won session once the restart delay passes.
    pub(crate) async fn schedule_restart(&self, stake: Stake) {
        let delay = self.settings.restart_delay;
        if delay.is_zero() {
            if let Err(e) = self.current(stake).await {
                warn!(stake, error = %e, "failed to restart session");
            }
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = engine.current(stake).await {
                warn!(stake, error = %e, "failed to restart session");
            }
        });
    }
}
