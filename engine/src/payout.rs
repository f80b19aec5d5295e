use crate::{Cache, Engine, Error, Result, Store, Wallet};
use tombola_types::{Money, Player, Posting, SessionId};
use tracing::{info, warn};

impl<S: Store, W: Wallet, C: Cache> Engine<S, W, C> {
    /// Pay the pot of `session` to `winner` and finish it.
    ///
    /// Serialized with the run start on the session lock. A session that is
    /// already finished yields [Error::AlreadyWon] and nothing is mutated.
    pub async fn finalize(&self, session: SessionId, winner: &Player) -> Result<Money> {
        let _guard = self.session_locks.lock(session).await;
        let game = self.store.session(session).await?;
        if game.finished {
            return Err(Error::AlreadyWon);
        }
        let now = self.now();
        let accepted = self.store.accepted(session).await;
        let basis = if game.charged {
            game.charged_count
        } else {
            accepted.len() as u32
        };
        let stake = Money::from_units(game.stake as i64);
        let pot = stake
            .mul_int(basis as i64)
            .percent(self.settings.payout_percent());

        self.wallet
            .credit(Posting::win(session, winner.id, pot, game.stake), now)
            .await?;
        self.wallet.record_win(winner.id).await?;

        if !game.charged {
            for loser in accepted.iter().filter(|s| s.player != winner.id) {
                let posting = Posting::settle(session, loser.player, stake, game.stake);
                if let Err(e) = self.wallet.debit(posting, now).await {
                    warn!(session, player = %loser.player, error = %e, "failed to settle stake");
                }
            }
        }

        self.store.finish(session, now, Some(winner.id)).await?;
        info!(
            stake = game.stake,
            session,
            winner = %winner.id,
            basis,
            %pot,
            charged = game.charged,
            "pot paid"
        );
        Ok(pot)
    }
}
