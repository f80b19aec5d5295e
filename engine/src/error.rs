use crate::{StoreError, WalletError};
use thiserror::Error;
use tombola_types::{PlayerId, SessionId};

/// Why a request collided with existing session state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    #[error("card {0} already accepted by another player")]
    CardTaken(u16),
    #[error("player already holds card {0}")]
    AlreadyHolding(u16),
    #[error("session already started")]
    SessionStarted,
    #[error("selection is locked once the countdown begins")]
    Locked,
    #[error("session already finished")]
    SessionFinished,
}

impl Conflict {
    pub fn reason(&self) -> &'static str {
        match self {
            Conflict::CardTaken(_) => "taken",
            Conflict::AlreadyHolding(_) => "already_holding",
            Conflict::SessionStarted => "started",
            Conflict::Locked => "countdown_or_started",
            Conflict::SessionFinished => "finished",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("player not found: {0}")]
    NotFound(PlayerId),
    #[error("conflict: {0}")]
    Conflict(#[from] Conflict),
    #[error("session has not started")]
    NotStarted,
    #[error("no accepted card in this session")]
    NoCard,
    #[error("session already won")]
    AlreadyWon,
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),
}

impl Error {
    /// Stable identifier sent to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::InvalidParams(_) => "invalid_params",
            Error::NotFound(_) => "player_not_found",
            Error::Conflict(conflict) => conflict.reason(),
            Error::NotStarted => "not_started",
            Error::NoCard => "no_card",
            Error::AlreadyWon => "already_won",
            Error::UnknownSession(_) => "unknown_session",
            Error::Wallet(_) => "wallet",
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownSession(id) => Error::UnknownSession(id),
            StoreError::CardTaken(index) => Conflict::CardTaken(index).into(),
            StoreError::AlreadyHolding(index) => Conflict::AlreadyHolding(index).into(),
            StoreError::Started(_) => Conflict::SessionStarted.into(),
            StoreError::Locked(_) => Conflict::Locked.into(),
            StoreError::Finished(_) => Conflict::SessionFinished.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_conflicts() {
        assert_eq!(
            Error::from(StoreError::CardTaken(7)),
            Error::Conflict(Conflict::CardTaken(7))
        );
        assert_eq!(Error::from(StoreError::Locked(1)).reason(), "countdown_or_started");
        assert_eq!(Error::from(StoreError::Started(1)).reason(), "started");
        assert_eq!(
            Error::from(StoreError::UnknownSession(9)),
            Error::UnknownSession(9)
        );
    }

    #[test]
    fn test_reasons() {
        assert_eq!(Error::AlreadyWon.reason(), "already_won");
        assert_eq!(Error::NoCard.reason(), "no_card");
        assert_eq!(Error::NotStarted.reason(), "not_started");
        assert_eq!(Error::NotFound(PlayerId(1)).reason(), "player_not_found");
        assert_eq!(
            Error::Wallet(WalletError::UnknownPlayer(PlayerId(3))).to_string(),
            "wallet error: unknown player 3"
        );
    }
}
