//! reference ledger for the veil shielded pool
//!
//! the authoritative side of the protocol, kept minimal on purpose:
//!
//! - commitment tree (append-only merkle tree of note commitments)
//! - spent nullifiers (prevents double-spend)
//! - current merkle root (proofs must be built against it)
//! - token accounting across pool, bridge escrow and external recipients
//!
//! clients never share memory with the ledger: they observe the
//! commitment-event log and replay it into their own accumulator instance.
//!
//! the real system puts this behind a contract; this crate implements the
//! same observable state machine in-process so the protocol scenarios are
//! executable end to end.

mod error;
mod pool;

#[cfg(test)]
mod tests;

pub use error::{LedgerError, Result};
pub use pool::{BridgeMessage, CommitmentEvent, Pool};
