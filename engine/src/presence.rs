use crate::{Cache, Engine, Store, Wallet};
use tombola_types::{GameSession, PlayerId, SessionId, Selection};
use tracing::{debug, info};

fn seen_key(player: PlayerId) -> String {
    format!("seen:{player}")
}

/// Reap throttle of a session.
pub(crate) fn stale_check_key(session: SessionId) -> String {
    format!("stale_check:{session}")
}

impl<S: Store, W: Wallet, C: Cache> Engine<S, W, C> {
    /// Record that `player` is active now.
    pub async fn heartbeat(&self, player: PlayerId) {
        self.cache
            .set(
                &seen_key(player),
                self.now().to_string(),
                self.settings.presence_ttl,
            )
            .await;
    }

    async fn last_seen(&self, player: PlayerId) -> Option<u64> {
        self.cache.get(&seen_key(player)).await?.parse().ok()
    }

    fn stale_before(&self) -> u64 {
        self.now()
            .saturating_sub(self.settings.presence_stale.as_millis() as u64)
    }

    /// Release accepted cards of absent players while the session is open.
    ///
    /// Throttled per session; returns the released selections.
    pub async fn reap(&self, session: &GameSession) -> Vec<Selection> {
        if !session.phase().is_open() {
            return Vec::new();
        }
        let throttle = stale_check_key(session.id);
        if !self
            .cache
            .add(&throttle, "1".to_string(), self.settings.reap_interval)
            .await
        {
            return Vec::new();
        }

        let threshold = self.stale_before();
        let mut released = Vec::new();
        for selection in self.store.accepted(session.id).await {
            if self
                .last_seen(selection.player)
                .await
                .is_some_and(|seen| seen >= threshold)
            {
                continue;
            }
            // The store refuses once the countdown has begun
            match self.store.release(session.id, selection.player).await {
                Ok(Some(selection)) => released.push(selection),
                Ok(None) => {}
                Err(e) => {
                    debug!(session = session.id, error = %e, "stopped reaping");
                    break;
                }
            }
        }
        if !released.is_empty() {
            info!(
                stake = session.stake,
                session = session.id,
                count = released.len(),
                "released stale cards"
            );
        }
        released
    }

    /// Accepted players seen within the staleness window.
    pub async fn online(&self, session: &GameSession) -> u32 {
        let threshold = self.stale_before();
        let mut online = 0;
        for selection in self.store.accepted(session.id).await {
            if self
                .last_seen(selection.player)
                .await
                .is_some_and(|seen| seen >= threshold)
            {
                online += 1;
            }
        }
        online
    }
}
