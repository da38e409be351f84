//! ledger rejection reasons

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid proof")]
    InvalidProof,

    #[error("nullifier already spent")]
    DoubleSpend,

    #[error("proof root is not the current root")]
    StaleRoot,

    #[error("ext data does not match its committed hash")]
    ExtDataMismatch,

    #[error("value not conserved")]
    ValueNotConserved,

    #[error("withdrawal without a recipient")]
    MissingRecipient,

    #[error("deposit {amount} exceeds limit {limit}")]
    DepositLimitExceeded { amount: u128, limit: u128 },

    #[error("bridge escrow does not hold the declared amount")]
    InsufficientBridgeFunds,

    #[error("pool does not hold enough tokens")]
    InsufficientPoolFunds,

    #[error("bridged amount {declared} does not match payload amount {encoded}")]
    AmountMismatch { declared: u128, encoded: i128 },

    #[error("commitment tree is full")]
    TreeFull,

    #[error("malformed payload: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
