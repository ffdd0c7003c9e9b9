//! Error taxonomy for the ledger core

use thiserror::Error;

/// Errors surfaced by the ledger store, the wallet service and their
/// collaborators. The request gate classifies these into HTTP status codes;
/// classification always happens against the underlying kind, never against
/// a wrapper.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("wallet not found")]
    WalletNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("transactions not found")]
    TransactionsNotFound,

    /// Caller is authenticated but does not own the resource.
    #[error("not allowed")]
    NotAllowed,

    #[error("invalid access token")]
    InvalidToken,

    #[error("duplicate wallet name")]
    DuplicateWallet,

    /// Idempotency key was already used.
    #[error("duplicate transaction")]
    DuplicateTransaction,

    #[error("wrong currency")]
    WrongCurrency,

    #[error("not enough balance")]
    NotEnoughBalance,

    #[error("nil owner id")]
    NilIdentity,

    /// Wallet currency changed between plan computation and commit.
    #[error("wallet was changed")]
    WalletWasChanged,

    /// Request understood structurally but rejected before persistence.
    #[error("{0}")]
    Precondition(String),

    /// Request could not be understood.
    #[error("{0}")]
    Validation(String),

    #[error("exchange rate unavailable: {0}")]
    RateUnavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
