//! Helpers for driving an engine on simulated time.

use crate::{
    Clock, Hub, ManualClock, MemoryCache, MemoryEngine, MemoryStore, MemoryWallet, Relay,
    RelayError, Result, Settings, Store,
};
use futures::{future::BoxFuture, FutureExt};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use tombola_types::{api::Broadcast, Money, Player, PlayerId, SessionId, Stake, BALLS};

/// Arbitrary fixed start time (2023-11-14).
pub const START_MS: u64 = 1_700_000_000_000;

/// Default settings, except a won session is replaced immediately.
pub fn instant_restart() -> Settings {
    Settings {
        restart_delay: Duration::ZERO,
        ..Settings::default()
    }
}

/// Creates an engine backed by in-memory collaborators and a manual clock.
pub fn create_engine(settings: Settings) -> (MemoryEngine, Arc<ManualClock>) {
    let hub = Hub::new(settings.topic_capacity);
    create_engine_with_hub(settings, hub)
}

pub fn create_engine_with_hub(settings: Settings, hub: Hub) -> (MemoryEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let shared: Arc<dyn Clock> = clock.clone();
    let engine = MemoryEngine::new(
        MemoryStore::new(),
        MemoryWallet::new(),
        MemoryCache::new(shared.clone()),
        shared,
        hub,
        settings,
    );
    (engine, clock)
}

/// Registers a player holding `units` whole currency units.
pub fn register_player(engine: &MemoryEngine, id: u64, units: i64) -> PlayerId {
    let player = PlayerId(id);
    engine.wallet().register(Player::new(
        player,
        Some(format!("player{id}")),
        Money::from_units(units),
    ));
    player
}

/// Seeds the current session of `stake` so `front` is drawn first.
pub async fn seed_front(engine: &MemoryEngine, stake: Stake, front: &[u8]) -> Result<SessionId> {
    let session = engine.current(stake).await?;
    let mut sequence = front.to_vec();
    sequence.extend((1..=BALLS).filter(|n| !front.contains(n)));
    engine.store().seed_sequence(session.id, sequence).await?;
    Ok(session.id)
}

/// Relay that records deliveries and fails the first `failures` of them.
#[derive(Default)]
pub struct RecordingRelay {
    delivered: Mutex<Vec<(Stake, Broadcast)>>,
    failures: AtomicUsize,
}

impl RecordingRelay {
    pub fn failing(failures: usize) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn delivered(&self) -> Vec<(Stake, Broadcast)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Relay for RecordingRelay {
    fn deliver(
        &self,
        stake: Stake,
        event: Broadcast,
    ) -> BoxFuture<'static, std::result::Result<(), RelayError>> {
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !fail {
            self.delivered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((stake, event));
        }
        async move {
            if fail {
                Err(RelayError("simulated outage".into()))
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}
