use std::{
    collections::HashMap,
    future::Future,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;
use tombola_types::{LedgerEntry, LedgerKind, Money, Player, PlayerId, Posting};
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("negative amount {0}")]
    NegativeAmount(Money),
}

/// Player accounts. Postings are idempotent per [Posting::key].
pub trait Wallet: Send + Sync + 'static {
    fn player(&self, id: PlayerId) -> impl Future<Output = Option<Player>> + Send;

    /// Take up to `posting.amount`, never below zero. Returns the amount taken.
    fn debit(
        &self,
        posting: Posting,
        at: u64,
    ) -> impl Future<Output = Result<Money, WalletError>> + Send;

    /// Add `posting.amount`. Returns the amount added.
    fn credit(
        &self,
        posting: Posting,
        at: u64,
    ) -> impl Future<Output = Result<Money, WalletError>> + Send;

    /// Bump the win counter, returning the new total.
    fn record_win(&self, id: PlayerId) -> impl Future<Output = Result<u32, WalletError>> + Send;

    fn ledger(&self, id: PlayerId) -> impl Future<Output = Vec<LedgerEntry>> + Send;
}

#[derive(Default)]
struct Accounts {
    players: HashMap<PlayerId, Player>,
    ledger: Vec<LedgerEntry>,
    applied: HashMap<String, Money>,
}

impl Accounts {
    fn post(&mut self, posting: Posting, at: u64, debit: bool) -> Result<Money, WalletError> {
        if posting.amount.is_negative() {
            return Err(WalletError::NegativeAmount(posting.amount));
        }
        if let Some(amount) = self.applied.get(&posting.key) {
            debug!(key = %posting.key, "posting already applied");
            return Ok(*amount);
        }
        let player = self
            .players
            .get_mut(&posting.player)
            .ok_or(WalletError::UnknownPlayer(posting.player))?;
        let (amount, signed) = if debit {
            let taken = posting.amount.min(player.wallet.clamp_zero());
            player.wallet -= taken;
            (taken, -taken)
        } else {
            player.wallet += posting.amount;
            (posting.amount, posting.amount)
        };
        self.applied.insert(posting.key.clone(), amount);
        self.ledger.push(LedgerEntry {
            key: posting.key,
            kind: posting.kind,
            player: posting.player,
            amount: signed,
            note: posting.note,
            at,
        });
        Ok(amount)
    }
}

/// In-process [Wallet] seeded through [MemoryWallet::register].
#[derive(Default)]
pub struct MemoryWallet {
    accounts: Mutex<Accounts>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an account.
    pub fn register(&self, player: Player) {
        self.lock().players.insert(player.id, player);
    }

    pub fn balance(&self, id: PlayerId) -> Option<Money> {
        self.lock().players.get(&id).map(|p| p.wallet)
    }

    /// All entries of one kind, oldest first.
    pub fn entries(&self, kind: LedgerKind) -> Vec<LedgerEntry> {
        self.lock()
            .ledger
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Accounts> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Wallet for MemoryWallet {
    async fn player(&self, id: PlayerId) -> Option<Player> {
        self.lock().players.get(&id).cloned()
    }

    async fn debit(&self, posting: Posting, at: u64) -> Result<Money, WalletError> {
        self.lock().post(posting, at, true)
    }

    async fn credit(&self, posting: Posting, at: u64) -> Result<Money, WalletError> {
        self.lock().post(posting, at, false)
    }

    async fn record_win(&self, id: PlayerId) -> Result<u32, WalletError> {
        let mut accounts = self.lock();
        let player = accounts
            .players
            .get_mut(&id)
            .ok_or(WalletError::UnknownPlayer(id))?;
        player.wins += 1;
        Ok(player.wins)
    }

    async fn ledger(&self, id: PlayerId) -> Vec<LedgerEntry> {
        self.lock()
            .ledger
            .iter()
            .filter(|e| e.player == id)
            .cloned()
            .collect()
    }
}
