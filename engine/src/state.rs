use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use thiserror::Error;
use tombola_types::{GameSession, PlayerId, Selection, SessionId, Stake};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("card {0} already accepted")]
    CardTaken(u16),
    #[error("player already holds card {0}")]
    AlreadyHolding(u16),
    #[error("session {0} already running")]
    Started(SessionId),
    #[error("session {0} is locked")]
    Locked(SessionId),
    #[error("session {0} already finished")]
    Finished(SessionId),
}

/// Result of asking the store to start a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunStart {
    pub session: GameSession,
    /// Accepted selections at the instant the run began.
    pub accepted: Vec<Selection>,
    /// Whether this call performed the transition.
    pub promoted: bool,
}

/// Sessions and selections. Every method is a single atomic transaction.
pub trait Store: Send + Sync + 'static {
    /// Newest session for a stake, finished or not.
    fn current_session(&self, stake: Stake)
        -> impl Future<Output = Option<GameSession>> + Send;

    /// Create a session and make it the newest for its stake.
    fn create_session(&self, stake: Stake, now: u64) -> impl Future<Output = GameSession> + Send;

    fn session(&self, id: SessionId)
        -> impl Future<Output = Result<GameSession, StoreError>> + Send;

    /// Record the countdown start unless one is already recorded.
    fn start_countdown(
        &self,
        id: SessionId,
        now: u64,
    ) -> impl Future<Output = Result<GameSession, StoreError>> + Send;

    /// Install a draw order. Returns false if one exists or the run began.
    fn seed_sequence(
        &self,
        id: SessionId,
        sequence: Vec<u8>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Set the run start (keeping any seeded sequence) and snapshot the
    /// accepted selections. Only the first caller sees `promoted`.
    fn begin_run(
        &self,
        id: SessionId,
        now: u64,
        sequence: Vec<u8>,
    ) -> impl Future<Output = Result<RunStart, StoreError>> + Send;

    fn mark_charged(
        &self,
        id: SessionId,
        count: u32,
    ) -> impl Future<Output = Result<GameSession, StoreError>> + Send;

    /// Mark finished. Fails with [StoreError::Finished] if already finished.
    fn finish(
        &self,
        id: SessionId,
        now: u64,
        winner: Option<PlayerId>,
    ) -> impl Future<Output = Result<GameSession, StoreError>> + Send;

    /// Sessions that ever reached the running phase, across stakes.
    fn started_count(&self) -> impl Future<Output = u64> + Send;

    fn selection(
        &self,
        id: SessionId,
        player: PlayerId,
    ) -> impl Future<Output = Option<Selection>> + Send;

    fn accepted(&self, id: SessionId) -> impl Future<Output = Vec<Selection>> + Send;

    /// Create or move the player's unaccepted selection.
    fn preview(
        &self,
        id: SessionId,
        player: PlayerId,
        index: u16,
        now: u64,
    ) -> impl Future<Output = Result<Selection, StoreError>> + Send;

    /// Lock in a card. The `(session, index)` uniqueness is checked here.
    fn accept(
        &self,
        id: SessionId,
        player: PlayerId,
        index: u16,
        now: u64,
    ) -> impl Future<Output = Result<Selection, StoreError>> + Send;

    /// Drop the player's selection. Accepted ones only while the session is open.
    fn release(
        &self,
        id: SessionId,
        player: PlayerId,
    ) -> impl Future<Output = Result<Option<Selection>, StoreError>> + Send;

    /// Drop the player's selection unconditionally.
    fn disqualify(
        &self,
        id: SessionId,
        player: PlayerId,
    ) -> impl Future<Output = Option<Selection>> + Send;

    /// Drop every selection of a session.
    fn purge(&self, id: SessionId) -> impl Future<Output = usize> + Send;
}

#[derive(Default)]
struct Tables {
    last_id: SessionId,
    sessions: BTreeMap<SessionId, GameSession>,
    newest: HashMap<Stake, SessionId>,
    selections: BTreeMap<(SessionId, PlayerId), Selection>,
    accepted_index: HashMap<(SessionId, u16), PlayerId>,
    started: u64,
}

impl Tables {
    fn session_mut(&mut self, id: SessionId) -> Result<&mut GameSession, StoreError> {
        self.sessions
            .get_mut(&id)
            .ok_or(StoreError::UnknownSession(id))
    }

    /// Selection may still change: session exists, not running, not finished.
    fn selectable(&self, id: SessionId) -> Result<(), StoreError> {
        let session = self
            .sessions
            .get(&id)
            .ok_or(StoreError::UnknownSession(id))?;
        if session.finished {
            return Err(StoreError::Finished(id));
        }
        if session.run_started_at.is_some() {
            return Err(StoreError::Started(id));
        }
        Ok(())
    }

    fn holder(&self, id: SessionId, index: u16) -> Option<PlayerId> {
        self.accepted_index.get(&(id, index)).copied()
    }

    fn accepted(&self, id: SessionId) -> Vec<Selection> {
        self.selections
            .range((id, PlayerId(u64::MIN))..=(id, PlayerId(u64::MAX)))
            .map(|(_, s)| s)
            .filter(|s| s.accepted)
            .cloned()
            .collect()
    }

    fn remove(&mut self, id: SessionId, player: PlayerId) -> Option<Selection> {
        let removed = self.selections.remove(&(id, player))?;
        if removed.accepted {
            self.accepted_index.remove(&(id, removed.index));
        }
        Some(removed)
    }
}

/// In-process [Store] behind a single lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    async fn current_session(&self, stake: Stake) -> Option<GameSession> {
        let tables = self.read();
        let id = tables.newest.get(&stake)?;
        tables.sessions.get(id).cloned()
    }

    async fn create_session(&self, stake: Stake, now: u64) -> GameSession {
        let mut tables = self.write();
        tables.last_id += 1;
        let session = GameSession::new(tables.last_id, stake, now);
        tables.sessions.insert(session.id, session.clone());
        tables.newest.insert(stake, session.id);
        session
    }

    async fn session(&self, id: SessionId) -> Result<GameSession, StoreError> {
        self.read()
            .sessions
            .get(&id)
            .cloned()
            .ok_or(StoreError::UnknownSession(id))
    }

    async fn start_countdown(&self, id: SessionId, now: u64) -> Result<GameSession, StoreError> {
        let mut tables = self.write();
        let session = tables.session_mut(id)?;
        if !session.finished
            && session.countdown_started_at.is_none()
            && session.run_started_at.is_none()
        {
            session.countdown_started_at = Some(now);
        }
        Ok(session.clone())
    }

    async fn seed_sequence(&self, id: SessionId, sequence: Vec<u8>) -> Result<bool, StoreError> {
        let mut tables = self.write();
        let session = tables.session_mut(id)?;
        if session.finished {
            return Err(StoreError::Finished(id));
        }
        if session.run_started_at.is_some() || !session.sequence.is_empty() {
            return Ok(false);
        }
        session.sequence = sequence;
        Ok(true)
    }

    async fn begin_run(
        &self,
        id: SessionId,
        now: u64,
        sequence: Vec<u8>,
    ) -> Result<RunStart, StoreError> {
        let mut tables = self.write();
        let session = tables.session_mut(id)?;
        let promoted = !session.finished && session.run_started_at.is_none();
        if promoted {
            session.run_started_at = Some(now);
            if session.sequence.is_empty() {
                session.sequence = sequence;
            }
        }
        let session = session.clone();
        if promoted {
            tables.started += 1;
        }
        Ok(RunStart {
            accepted: tables.accepted(id),
            session,
            promoted,
        })
    }

    async fn mark_charged(&self, id: SessionId, count: u32) -> Result<GameSession, StoreError> {
        let mut tables = self.write();
        let session = tables.session_mut(id)?;
        session.charged = true;
        session.charged_count = count;
        Ok(session.clone())
    }

    async fn finish(
        &self,
        id: SessionId,
        now: u64,
        winner: Option<PlayerId>,
    ) -> Result<GameSession, StoreError> {
        let mut tables = self.write();
        let session = tables.session_mut(id)?;
        if session.finished {
            return Err(StoreError::Finished(id));
        }
        session.finished = true;
        session.finished_at = Some(now);
        session.winner = winner;
        Ok(session.clone())
    }

    async fn started_count(&self) -> u64 {
        self.read().started
    }

    async fn selection(&self, id: SessionId, player: PlayerId) -> Option<Selection> {
        self.read().selections.get(&(id, player)).cloned()
    }

    async fn accepted(&self, id: SessionId) -> Vec<Selection> {
        self.read().accepted(id)
    }

    async fn preview(
        &self,
        id: SessionId,
        player: PlayerId,
        index: u16,
        now: u64,
    ) -> Result<Selection, StoreError> {
        let mut tables = self.write();
        tables.selectable(id)?;
        if let Some(existing) = tables.selections.get(&(id, player)) {
            if existing.accepted {
                if existing.index == index {
                    return Ok(existing.clone());
                }
                return Err(StoreError::AlreadyHolding(existing.index));
            }
        }
        if tables.holder(id, index).is_some() {
            return Err(StoreError::CardTaken(index));
        }
        let selection = tables
            .selections
            .entry((id, player))
            .and_modify(|s| s.index = index)
            .or_insert_with(|| Selection {
                session: id,
                player,
                index,
                accepted: false,
                created_at: now,
            });
        Ok(selection.clone())
    }

    async fn accept(
        &self,
        id: SessionId,
        player: PlayerId,
        index: u16,
        now: u64,
    ) -> Result<Selection, StoreError> {
        let mut tables = self.write();
        tables.selectable(id)?;
        if let Some(existing) = tables.selections.get(&(id, player)) {
            if existing.accepted {
                if existing.index == index {
                    return Ok(existing.clone());
                }
                return Err(StoreError::AlreadyHolding(existing.index));
            }
        }
        if tables.holder(id, index).is_some() {
            return Err(StoreError::CardTaken(index));
        }
        let selection = Selection {
            session: id,
            player,
            index,
            accepted: true,
            created_at: now,
        };
        tables.accepted_index.insert((id, index), player);
        tables.selections.insert((id, player), selection.clone());
        Ok(selection)
    }

    async fn release(
        &self,
        id: SessionId,
        player: PlayerId,
    ) -> Result<Option<Selection>, StoreError> {
        let mut tables = self.write();
        let session = tables
            .sessions
            .get(&id)
            .ok_or(StoreError::UnknownSession(id))?;
        let open = !session.finished
            && session.countdown_started_at.is_none()
            && session.run_started_at.is_none();
        let accepted = match tables.selections.get(&(id, player)) {
            None => return Ok(None),
            Some(existing) => existing.accepted,
        };
        if accepted && !open {
            return Err(StoreError::Locked(id));
        }
        Ok(tables.remove(id, player))
    }

    async fn disqualify(&self, id: SessionId, player: PlayerId) -> Option<Selection> {
        self.write().remove(id, player)
    }

    async fn purge(&self, id: SessionId) -> usize {
        let mut tables = self.write();
        let players: Vec<PlayerId> = tables
            .selections
            .range((id, PlayerId(u64::MIN))..=(id, PlayerId(u64::MAX)))
            .map(|((_, player), _)| *player)
            .collect();
        for player in &players {
            tables.remove(id, *player);
        }
        players.len()
    }
}
