//! the pool state machine
//!
//! `submit` is the single mutation path: verify everything first, then apply
//! atomically. token movements mirror what the bridge and token contracts do
//! around the pool: deposits arrive through the bridge escrow, local
//! withdrawals credit an external recipient, cross-chain withdrawals park
//! value on the bridge and emit a settlement message.

use std::collections::{HashMap, HashSet};

use veil_pool::bridge::decode_from_bridge;
use veil_pool::transaction::ext_data_hash;
use veil_pool::{
    ExternalAddress, MerkleRoot, MerkleTree, NoteCommitment, Nullifier, TransactionPayload,
    Verifier,
};

use crate::error::{LedgerError, Result};

/// note-creation event, appended per output in global insertion order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentEvent {
    pub commitment: NoteCommitment,
    pub leaf_index: u64,
    pub encrypted_output: Vec<u8>,
}

/// withdrawal instruction emitted toward the base-chain unwrap contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeMessage {
    pub recipient: ExternalAddress,
    pub amount: u128,
}

/// authoritative pool state
pub struct Pool<V> {
    tree: MerkleTree,
    spent: HashSet<Nullifier>,
    events: Vec<CommitmentEvent>,
    bridge_messages: Vec<BridgeMessage>,
    pool_balance: u128,
    bridge_balance: u128,
    external_balances: HashMap<ExternalAddress, u128>,
    fees_collected: u128,
    max_deposit: Option<u128>,
    verifier: V,
}

impl<V: Verifier> Pool<V> {
    pub fn new(tree_height: usize, verifier: V) -> Self {
        Self {
            tree: MerkleTree::new(tree_height),
            spent: HashSet::new(),
            events: Vec::new(),
            bridge_messages: Vec::new(),
            pool_balance: 0,
            bridge_balance: 0,
            external_balances: HashMap::new(),
            fees_collected: 0,
            max_deposit: None,
            verifier,
        }
    }

    /// cap single deposits (dust/whale limit, matches the reference pool's
    /// maximum deposit amount)
    pub fn with_max_deposit(mut self, limit: u128) -> Self {
        self.max_deposit = Some(limit);
        self
    }

    /// submit a transaction; on success returns the emitted events
    pub fn submit(&mut self, payload: &TransactionPayload) -> Result<Vec<CommitmentEvent>> {
        match self.check_and_apply(payload) {
            Ok(events) => {
                tracing::info!(
                    outputs = events.len(),
                    ext_amount = payload.ext_data.ext_amount,
                    "transaction accepted"
                );
                Ok(events)
            }
            Err(e) => {
                tracing::warn!(error = %e, "transaction rejected");
                Err(e)
            }
        }
    }

    /// bridge deposit entry point
    ///
    /// the bridge has already escrowed `amount` tokens; decode the payload,
    /// require it to declare the same deposit, move the tokens into the pool
    /// and run the normal submission path.
    pub fn on_token_bridged(&mut self, amount: u128, data: &[u8]) -> Result<Vec<CommitmentEvent>> {
        let payload = decode_from_bridge(data).map_err(|e| LedgerError::Malformed(e.to_string()))?;

        if payload.ext_data.ext_amount != i128::try_from(amount).unwrap_or(i128::MAX) {
            return Err(LedgerError::AmountMismatch {
                declared: amount,
                encoded: payload.ext_data.ext_amount,
            });
        }
        if self.bridge_balance < amount {
            return Err(LedgerError::InsufficientBridgeFunds);
        }

        // hand escrow to the pool; refund the bridge if submission fails
        self.bridge_balance -= amount;
        match self.submit(&payload) {
            Ok(events) => Ok(events),
            Err(e) => {
                self.bridge_balance += amount;
                Err(e)
            }
        }
    }

    /// tokens arriving on the bridge escrow (the relay's transfer leg)
    pub fn fund_bridge(&mut self, amount: u128) {
        self.bridge_balance += amount;
    }

    fn check_and_apply(&mut self, payload: &TransactionPayload) -> Result<Vec<CommitmentEvent>> {
        let public = &payload.public_inputs;
        let ext = &payload.ext_data;

        // metadata must be the metadata the proof committed to
        if ext_data_hash(ext) != public.ext_data_hash {
            return Err(LedgerError::ExtDataMismatch);
        }

        // public amount is the ext amount net of fee
        let fee = i128::try_from(ext.fee.0).map_err(|_| LedgerError::ValueNotConserved)?;
        let net = ext
            .ext_amount
            .checked_sub(fee)
            .ok_or(LedgerError::ValueNotConserved)?;
        if public.public_amount != net {
            return Err(LedgerError::ValueNotConserved);
        }

        if public.root != self.tree.root() {
            return Err(LedgerError::StaleRoot);
        }

        let mut seen = HashSet::with_capacity(public.nullifiers.len());
        for nullifier in &public.nullifiers {
            if self.spent.contains(nullifier) || !seen.insert(*nullifier) {
                return Err(LedgerError::DoubleSpend);
            }
        }

        if !self.verifier.verify(&payload.proof, public) {
            return Err(LedgerError::InvalidProof);
        }

        if ext.encrypted_outputs.len() != public.output_commitments.len() {
            return Err(LedgerError::Malformed(
                "one ciphertext required per output".into(),
            ));
        }
        if self.tree.len() + public.output_commitments.len() as u64 > self.tree.capacity() {
            return Err(LedgerError::TreeFull);
        }

        // token movement, checked before any state is touched
        let mut pool_balance = self.pool_balance;
        let mut credit: Option<(ExternalAddress, u128, bool)> = None;
        if ext.ext_amount > 0 {
            let amount = ext.ext_amount.unsigned_abs();
            if let Some(limit) = self.max_deposit {
                if amount > limit {
                    return Err(LedgerError::DepositLimitExceeded { amount, limit });
                }
            }
            pool_balance = pool_balance
                .checked_add(amount)
                .ok_or(LedgerError::ValueNotConserved)?;
        } else if ext.ext_amount < 0 {
            let amount = ext.ext_amount.unsigned_abs();
            let recipient = ext.recipient.ok_or(LedgerError::MissingRecipient)?;
            pool_balance = pool_balance
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientPoolFunds)?;
            credit = Some((recipient, amount, ext.cross_chain_withdrawal));
        }
        pool_balance = pool_balance
            .checked_sub(ext.fee.0)
            .ok_or(LedgerError::InsufficientPoolFunds)?;

        // all checks passed - apply atomically
        self.pool_balance = pool_balance;
        self.fees_collected += ext.fee.0;

        for nullifier in &public.nullifiers {
            self.spent.insert(*nullifier);
        }

        let mut emitted = Vec::with_capacity(public.output_commitments.len());
        for (commitment, ciphertext) in public
            .output_commitments
            .iter()
            .zip(&ext.encrypted_outputs)
        {
            // capacity was checked above
            let leaf_index = self
                .tree
                .insert(*commitment)
                .map_err(|_| LedgerError::TreeFull)?;
            let event = CommitmentEvent {
                commitment: *commitment,
                leaf_index,
                encrypted_output: ciphertext.clone(),
            };
            self.events.push(event.clone());
            emitted.push(event);
        }

        if let Some((recipient, amount, cross_chain)) = credit {
            if cross_chain {
                self.bridge_balance += amount;
                self.bridge_messages.push(BridgeMessage { recipient, amount });
            } else {
                *self.external_balances.entry(recipient).or_insert(0) += amount;
            }
        }

        Ok(emitted)
    }

    // ---- observers ----

    pub fn root(&self) -> MerkleRoot {
        self.tree.root()
    }

    pub fn tree_size(&self) -> u64 {
        self.tree.len()
    }

    pub fn is_spent(&self, nullifier: &Nullifier) -> bool {
        self.spent.contains(nullifier)
    }

    /// full event log, globally ordered by insertion
    pub fn events(&self) -> &[CommitmentEvent] {
        &self.events
    }

    /// events from a historical offset; rescanning is idempotent
    pub fn events_from(&self, offset: usize) -> &[CommitmentEvent] {
        &self.events[offset.min(self.events.len())..]
    }

    pub fn bridge_messages(&self) -> &[BridgeMessage] {
        &self.bridge_messages
    }

    pub fn pool_balance(&self) -> u128 {
        self.pool_balance
    }

    pub fn bridge_balance(&self) -> u128 {
        self.bridge_balance
    }

    pub fn balance_of(&self, recipient: &ExternalAddress) -> u128 {
        self.external_balances.get(recipient).copied().unwrap_or(0)
    }

    pub fn fees_collected(&self) -> u128 {
        self.fees_collected
    }
}
