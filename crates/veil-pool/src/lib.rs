//! veil shielded pool core
//!
//! utxo-based private value pool with cross-chain settlement
//!
//! # architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SHIELDED VALUE POOL                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ledger (authoritative, external)                            │
//! │  ├─ commitment tree (append-only merkle root)                │
//! │  ├─ nullifier set (spent notes)                              │
//! │  └─ bridge entry points for deposits/withdrawals             │
//! │                                                              │
//! │  client (this crate)                                         │
//! │  ├─ keypairs + shareable addresses                           │
//! │  ├─ notes: commitment / nullifier / encryption               │
//! │  ├─ mirrored accumulator (rebuilt from ledger events)        │
//! │  └─ transaction assembly: witnesses → proof → payload        │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! the proving backend is opaque: the [`proof::Prover`] and
//! [`proof::Verifier`] traits are the seam where a real zk backend plugs in.

pub mod bridge;
pub mod error;
pub mod keys;
pub mod merkle;
pub mod note;
pub mod proof;
pub mod transaction;

pub use error::{Error, Result};
pub use keys::{Keypair, PublicKey, Signature};
pub use merkle::{MerklePath, MerkleRoot, MerkleTree};
pub use note::{Amount, Note, NoteCommitment, Nullifier};
pub use proof::{Proof, Prover, PublicInputs, TranscriptProver, Verifier, Witness};
pub use transaction::{
    ExtData, ExternalAddress, TransactionPayload, TransactionRequest, MAX_INPUTS, MAX_OUTPUTS,
};

/// domain separator for note commitments
pub const NOTE_DOMAIN: &[u8] = b"veil.pool.note.v1";
/// domain separator for nullifiers
pub const NULLIFIER_DOMAIN: &[u8] = b"veil.pool.nullifier.v1";
/// domain separator for merkle node hashes
pub const MERKLE_DOMAIN: &[u8] = b"veil.pool.merkle.v1";
/// domain separator for external-data hashes
pub const EXT_DATA_DOMAIN: &[u8] = b"veil.pool.ext-data.v1";
