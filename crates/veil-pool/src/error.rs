//! error types for the pool core

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("keypair has no private key")]
    MissingPrivateKey,

    #[error("note is not anchored in the accumulator")]
    NotAnchored,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("accumulator is full")]
    TreeFull,

    #[error("unknown leaf index {0}")]
    UnknownLeaf(u64),

    #[error("too many inputs: {0}")]
    TooManyInputs(usize),

    #[error("too many outputs: {0}")]
    TooManyOutputs(usize),

    #[error("imbalanced transaction: declared {declared}, computed {computed}")]
    ImbalancedTransaction { declared: i128, computed: i128 },

    #[error("withdrawal without a recipient")]
    MissingRecipient,

    #[error("caller does not own an input note")]
    UnauthorizedSpend,

    #[error("amount arithmetic overflow")]
    AmountOverflow,

    #[error("proving failed: {0}")]
    ProvingFailed(String),

    #[error("malformed bridge payload: {0}")]
    MalformedPayload(String),
}

pub type Result<T> = std::result::Result<T, Error>;
