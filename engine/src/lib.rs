//! Session engine for tombola bingo.
//!
//! All timing is derived from stored timestamps whenever a caller touches a
//! stake; there is no background scheduler. Transitions that must happen once
//! (charging at run start, paying a winner, finishing an exhausted session)
//! run under a per-session lock and re-check their guard inside it.

mod cache;
mod clock;
mod engine;
mod error;
mod hub;
pub mod lifecycle;
mod locks;
mod payout;
mod presence;
mod registry;
pub mod sequence;
mod settings;
mod state;
pub mod validator;
mod wallet;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;


pub use cache::{Cache, MemoryCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{ClaimOutcome, Engine, MemoryEngine};
pub use error::{Conflict, Error, Result};
pub use hub::{Hub, Relay, RelayError};
pub use locks::KeyedLocks;
pub use settings::Settings;
pub use state::{MemoryStore, RunStart, Store, StoreError};
pub use wallet::{MemoryWallet, Wallet, WalletError};
