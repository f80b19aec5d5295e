use crate::{sequence, Cache, Engine, Error, Result, Store, Wallet};
use tombola_types::{
    api::{AbandonView, Intent, SelectionView},
    Card, GameSession, PlayerId, Selection, Stake, CARD_COUNT,
};
use tracing::{info, warn};

fn card_index(index: i64) -> Result<u16> {
    u16::try_from(index)
        .ok()
        .filter(|i| (1..=CARD_COUNT).contains(i))
        .ok_or_else(|| Error::InvalidParams(format!("card index {index} out of range")))
}

impl<S: Store, W: Wallet, C: Cache> Engine<S, W, C> {
    /// Preview, accept or cancel a card for `player` in the current session.
    ///
    /// Index uniqueness is enforced by the store on accept, so a preview that
    /// succeeded earlier can still lose the card to a concurrent acceptor.
    pub async fn select(
        &self,
        player: PlayerId,
        stake: Stake,
        index: i64,
        intent: Intent,
    ) -> Result<SelectionView> {
        // Cancel releases whatever the player holds
        let index = match intent {
            Intent::Cancel => 0,
            Intent::Preview | Intent::Accept => card_index(index)?,
        };
        self.wallet
            .player(player)
            .await
            .ok_or(Error::NotFound(player))?;
        let session = self.advance(stake).await?;
        let now = self.now();

        let mut biased = false;
        let selection = match intent {
            Intent::Preview => Some(self.store.preview(session.id, player, index, now).await?),
            Intent::Accept => {
                let selection = self.store.accept(session.id, player, index, now).await?;
                biased = self.apply_bias(&session, &selection).await;
                info!(stake, session = session.id, player = %player, index, "card accepted");
                Some(selection)
            }
            Intent::Cancel => {
                self.store.release(session.id, player).await?;
                None
            }
        };

        // Accepting may have made the countdown due
        let session = match intent {
            Intent::Accept => self.advance(stake).await?,
            _ => self.store.session(session.id).await?,
        };
        let taken = self.taken(&session).await;
        Ok(SelectionView {
            ok: true,
            game_id: session.id,
            index: selection.as_ref().map(|s| s.index),
            accepted: selection.as_ref().is_some_and(|s| s.accepted),
            accepted_count: taken.len() as u32,
            taken,
            countdown_started_at: session.countdown_started_at,
            biased,
            card: selection.map(|s| Card::generate(s.index as i64)),
        })
    }

    /// Release the player's card in the current session, if it is still open.
    pub async fn abandon(&self, player: PlayerId, stake: Stake) -> Result<AbandonView> {
        self.wallet
            .player(player)
            .await
            .ok_or(Error::NotFound(player))?;
        let session = self.current(stake).await?;
        let released = self.store.release(session.id, player).await?;
        if let Some(selection) = &released {
            info!(stake, session = session.id, player = %player, index = selection.index, "card released");
        }
        let taken = self.taken(&session).await;
        Ok(AbandonView {
            ok: true,
            released: released.is_some(),
            accepted_count: taken.len() as u32,
            taken,
        })
    }

    /// Draw the privileged player's numbers first, if the sequence is unset.
    async fn apply_bias(&self, session: &GameSession, selection: &Selection) -> bool {
        if self.settings.privileged != Some(selection.player) || session.is_running() {
            return false;
        }
        let card = Card::generate(selection.index as i64);
        let biased = sequence::biased(&card, &mut rand::thread_rng());
        match self.store.seed_sequence(session.id, biased).await {
            Ok(applied) => {
                if applied {
                    warn!(
                        stake = session.stake,
                        session = session.id,
                        player = %selection.player,
                        index = selection.index,
                        "privileged sequence applied"
                    );
                }
                applied
            }
            Err(e) => {
                warn!(session = session.id, error = %e, "failed to seed sequence");
                false
            }
        }
    }

    async fn taken(&self, session: &GameSession) -> Vec<u16> {
        let mut taken: Vec<u16> = self
            .store
            .accepted(session.id)
            .await
            .iter()
            .map(|s| s.index)
            .collect();
        taken.sort_unstable();
        taken
    }
}
