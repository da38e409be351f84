//! transaction assembly
//!
//! turns a set of spent notes and desired outputs into a balanced, provable,
//! bridge-aware payload:
//!
//! 1. validate arity, pad with zero-amount dummy notes to the arity the
//!    proving relation expects (2 or 16 inputs, always 2 outputs)
//! 2. fetch membership witnesses for every real input
//! 3. compute the public amount and check the balance equation
//! 4. derive nullifiers (requires the owning secrets)
//! 5. encrypt each output for its recipient
//! 6. shuffle output order so slot position never correlates with recipient
//! 7. invoke the proving backend
//! 8. package `{proof, public inputs, ext data}` for submission

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};
use scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::Keypair;
use crate::merkle::MerkleTree;
use crate::note::{Amount, Note};
use crate::proof::{OutputWitness, Proof, Prover, PublicInputs, SpendWitness, Witness};
use crate::EXT_DATA_DOMAIN;

/// largest input arity the proving relation supports
pub const MAX_INPUTS: usize = 16;
/// small input arity, used whenever two inputs suffice
pub const SMALL_INPUT_ARITY: usize = 2;
/// fixed output arity
pub const MAX_OUTPUTS: usize = 2;

/// address on the transparent side (recipient of a withdrawal)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize,
)]
pub struct ExternalAddress(pub [u8; 20]);

impl fmt::Display for ExternalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for ExternalAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex_part = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(hex_part).map_err(|e| Error::InvalidAddress(format!("invalid hex: {e}")))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAddress("expected 20 bytes".into()))?;
        Ok(Self(bytes))
    }
}

/// transaction metadata bound to the proof via `ext_data_hash`
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ExtData {
    /// withdrawal recipient; `None` for pure deposits/transfers
    pub recipient: Option<ExternalAddress>,
    /// value entering (+) or leaving (-) the pool, before fee
    pub ext_amount: i128,
    pub fee: Amount,
    /// one ciphertext per output, in submitted (shuffled) order
    pub encrypted_outputs: Vec<Vec<u8>>,
    /// route the withdrawal over the bridge to the base chain
    pub cross_chain_withdrawal: bool,
}

/// binding of the metadata the proof commits to
pub fn ext_data_hash(ext: &ExtData) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(EXT_DATA_DOMAIN);
    hasher.update(&ext.encode());
    *hasher.finalize().as_bytes()
}

/// submission payload: proof, public input tuple, metadata
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub proof: Proof,
    pub public_inputs: PublicInputs,
    pub ext_data: ExtData,
}

/// caller-declared transaction intent
#[derive(Debug, Default)]
pub struct TransactionRequest {
    inputs: Vec<Note>,
    outputs: Vec<Note>,
    recipient: Option<ExternalAddress>,
    fee: Amount,
    declared_deposit: Option<Amount>,
    cross_chain_withdrawal: bool,
}

impl TransactionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// spend an anchored note
    pub fn input(mut self, note: Note) -> Self {
        self.inputs.push(note);
        self
    }

    /// create a note (unanchored; the ledger assigns its position)
    pub fn output(mut self, note: Note) -> Self {
        self.outputs.push(note);
        self
    }

    pub fn fee(mut self, fee: Amount) -> Self {
        self.fee = fee;
        self
    }

    /// declare a deposit of exactly `amount` into the pool
    pub fn deposit(mut self, amount: Amount) -> Self {
        self.declared_deposit = Some(amount);
        self
    }

    /// withdraw the residual value to `recipient` on this chain
    pub fn withdraw_to(mut self, recipient: ExternalAddress) -> Self {
        self.recipient = Some(recipient);
        self.cross_chain_withdrawal = false;
        self
    }

    /// withdraw the residual value across the bridge to the base chain
    pub fn withdraw_cross_chain_to(mut self, recipient: ExternalAddress) -> Self {
        self.recipient = Some(recipient);
        self.cross_chain_withdrawal = true;
        self
    }

    /// assemble a provable payload against the given accumulator snapshot
    pub fn assemble<R: RngCore + CryptoRng>(
        self,
        tree: &MerkleTree,
        prover: &dyn Prover,
        rng: &mut R,
    ) -> Result<TransactionPayload> {
        if self.inputs.len() > MAX_INPUTS {
            return Err(Error::TooManyInputs(self.inputs.len()));
        }
        if self.outputs.len() > MAX_OUTPUTS {
            return Err(Error::TooManyOutputs(self.outputs.len()));
        }

        // pad inputs with dummies up to the relation's arity
        let arity = if self.inputs.len() <= SMALL_INPUT_ARITY {
            SMALL_INPUT_ARITY
        } else {
            MAX_INPUTS
        };
        let mut inputs = self.inputs;
        while inputs.len() < arity {
            inputs.push(dummy_note(rng));
        }

        // membership witness per real input; dummies get a zero path the
        // relation never checks
        let mut spends = Vec::with_capacity(inputs.len());
        for note in &mut inputs {
            let spend = if note.amount.is_zero() {
                if note.leaf_index.is_none() {
                    *note = note.with_position(0);
                }
                SpendWitness {
                    amount: Amount::ZERO,
                    commitment: note.commitment(),
                    nullifier: derive_nullifier(note)?,
                    path: tree.empty_path(),
                }
            } else {
                let index = note.leaf_index.ok_or(Error::NotAnchored)?;
                if tree.leaf(index) != Some(note.commitment()) {
                    return Err(Error::NotAnchored);
                }
                SpendWitness {
                    amount: note.amount,
                    commitment: note.commitment(),
                    nullifier: derive_nullifier(note)?,
                    path: tree.witness(index)?,
                }
            };
            spends.push(spend);
        }

        // balance: sum(in) + ext_amount = sum(out) + fee
        let mut sum_in: i128 = 0;
        for note in &inputs {
            sum_in = sum_in
                .checked_add(note.amount.to_signed()?)
                .ok_or(Error::AmountOverflow)?;
        }
        let mut outputs = self.outputs;
        while outputs.len() < MAX_OUTPUTS {
            outputs.push(dummy_note(rng));
        }
        let mut sum_out: i128 = 0;
        for note in &outputs {
            sum_out = sum_out
                .checked_add(note.amount.to_signed()?)
                .ok_or(Error::AmountOverflow)?;
        }

        let ext_amount = sum_out
            .checked_add(self.fee.to_signed()?)
            .and_then(|v| v.checked_sub(sum_in))
            .ok_or(Error::AmountOverflow)?;

        if let Some(declared) = self.declared_deposit {
            if ext_amount != declared.to_signed()? {
                return Err(Error::ImbalancedTransaction {
                    declared: declared.to_signed()?,
                    computed: ext_amount,
                });
            }
        }
        if ext_amount < 0 && self.recipient.is_none() {
            return Err(Error::MissingRecipient);
        }

        // randomize output order so slot position carries no recipient signal
        outputs.shuffle(rng);

        let mut encrypted_outputs = Vec::with_capacity(outputs.len());
        let mut output_witnesses = Vec::with_capacity(outputs.len());
        for note in &outputs {
            encrypted_outputs.push(note.encrypt(rng)?);
            output_witnesses.push(OutputWitness {
                amount: note.amount,
                commitment: note.commitment(),
            });
        }

        let ext_data = ExtData {
            recipient: self.recipient,
            ext_amount,
            fee: self.fee,
            encrypted_outputs,
            cross_chain_withdrawal: self.cross_chain_withdrawal,
        };

        let public_amount = ext_amount
            .checked_sub(self.fee.to_signed()?)
            .ok_or(Error::AmountOverflow)?;

        let public = PublicInputs {
            root: tree.root(),
            public_amount,
            ext_data_hash: ext_data_hash(&ext_data),
            nullifiers: spends.iter().map(|s| s.nullifier).collect(),
            output_commitments: output_witnesses.iter().map(|o| o.commitment).collect(),
        };

        let witness = Witness {
            spends,
            outputs: output_witnesses,
            public: public.clone(),
        };
        let proof = prover.prove(&witness)?;

        Ok(TransactionPayload {
            proof,
            public_inputs: public,
            ext_data,
        })
    }
}

fn dummy_note<R: RngCore + CryptoRng>(rng: &mut R) -> Note {
    // throwaway owner; the nullifier is still derived and published
    Note::new(Amount::ZERO, Keypair::generate(rng), rng).with_position(0)
}

fn derive_nullifier(note: &Note) -> Result<crate::note::Nullifier> {
    note.nullifier().map_err(|e| match e {
        Error::MissingPrivateKey => Error::UnauthorizedSpend,
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::{TranscriptProver, Verifier};
    use rand::rngs::OsRng;

    fn recipient() -> ExternalAddress {
        "0xDeaD00000000000000000000000000000000BEEf"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_external_address_round_trip() {
        let addr = recipient();
        assert_eq!(
            addr.to_string(),
            "0xdead00000000000000000000000000000000beef"
        );
        assert_eq!(addr.to_string().parse::<ExternalAddress>().unwrap(), addr);
        assert!("0x1234".parse::<ExternalAddress>().is_err());
    }

    #[test]
    fn test_deposit_assembles_and_verifies() {
        let mut rng = OsRng;
        let tree = MerkleTree::new(5);
        let kp = Keypair::generate(&mut rng);
        let note = Note::new(Amount(100), kp, &mut rng);
        let commitment = note.commitment();

        let payload = TransactionRequest::new()
            .output(note)
            .deposit(Amount(100))
            .assemble(&tree, &TranscriptProver, &mut rng)
            .unwrap();

        assert_eq!(payload.ext_data.ext_amount, 100);
        assert_eq!(payload.public_inputs.public_amount, 100);
        assert_eq!(payload.public_inputs.root, tree.root());
        assert_eq!(payload.public_inputs.nullifiers.len(), SMALL_INPUT_ARITY);
        assert_eq!(payload.public_inputs.output_commitments.len(), MAX_OUTPUTS);
        assert!(payload
            .public_inputs
            .output_commitments
            .contains(&commitment));
        assert!(TranscriptProver.verify(&payload.proof, &payload.public_inputs));
    }

    #[test]
    fn test_declared_deposit_mismatch() {
        let mut rng = OsRng;
        let tree = MerkleTree::new(5);
        let kp = Keypair::generate(&mut rng);

        let result = TransactionRequest::new()
            .output(Note::new(Amount(100), kp, &mut rng))
            .deposit(Amount(90))
            .assemble(&tree, &TranscriptProver, &mut rng);

        assert_eq!(
            result.unwrap_err(),
            Error::ImbalancedTransaction {
                declared: 90,
                computed: 100,
            }
        );
    }

    #[test]
    fn test_withdrawal_requires_recipient() {
        let mut rng = OsRng;
        let mut tree = MerkleTree::new(5);
        let kp = Keypair::generate(&mut rng);
        let note = Note::new(Amount(100), kp, &mut rng);
        let index = tree.insert(note.commitment()).unwrap();

        let result = TransactionRequest::new()
            .input(note.with_position(index))
            .assemble(&tree, &TranscriptProver, &mut rng);

        assert_eq!(result.unwrap_err(), Error::MissingRecipient);
    }

    #[test]
    fn test_unanchored_input_rejected() {
        let mut rng = OsRng;
        let tree = MerkleTree::new(5);
        let kp = Keypair::generate(&mut rng);
        let note = Note::new(Amount(100), kp, &mut rng);

        // never inserted into the tree
        let result = TransactionRequest::new()
            .input(note.with_position(0))
            .withdraw_to(recipient())
            .assemble(&tree, &TranscriptProver, &mut rng);
        assert_eq!(result.unwrap_err(), Error::NotAnchored);

        // no position at all
        let kp = Keypair::generate(&mut rng);
        let note = Note::new(Amount(100), kp, &mut rng);
        let result = TransactionRequest::new()
            .input(note)
            .withdraw_to(recipient())
            .assemble(&tree, &TranscriptProver, &mut rng);
        assert_eq!(result.unwrap_err(), Error::NotAnchored);
    }

    #[test]
    fn test_spending_someone_elses_note_rejected() {
        let mut rng = OsRng;
        let mut tree = MerkleTree::new(5);
        let owner = Keypair::generate(&mut rng);
        let observer = Keypair::from_address(&owner.address()).unwrap();

        let note = Note::with_blinding(Amount(100), observer, [5u8; 32]);
        let index = tree.insert(note.commitment()).unwrap();

        let result = TransactionRequest::new()
            .input(note.with_position(index))
            .withdraw_to(recipient())
            .assemble(&tree, &TranscriptProver, &mut rng);

        assert_eq!(result.unwrap_err(), Error::UnauthorizedSpend);
    }

    #[test]
    fn test_arity_limits() {
        let mut rng = OsRng;
        let tree = MerkleTree::new(5);
        let kp = Keypair::generate(&mut rng);

        let mut request = TransactionRequest::new();
        for _ in 0..MAX_INPUTS + 1 {
            request = request.input(Note::new(Amount::ZERO, kp.clone(), &mut rng));
        }
        assert_eq!(
            request
                .assemble(&tree, &TranscriptProver, &mut rng)
                .unwrap_err(),
            Error::TooManyInputs(MAX_INPUTS + 1)
        );

        let mut request = TransactionRequest::new();
        for _ in 0..MAX_OUTPUTS + 1 {
            request = request.output(Note::new(Amount::ZERO, kp.clone(), &mut rng));
        }
        assert_eq!(
            request
                .assemble(&tree, &TranscriptProver, &mut rng)
                .unwrap_err(),
            Error::TooManyOutputs(MAX_OUTPUTS + 1)
        );
    }

    #[test]
    fn test_large_input_set_pads_to_sixteen() {
        let mut rng = OsRng;
        let mut tree = MerkleTree::new(5);
        let kp = Keypair::generate(&mut rng);

        let mut request = TransactionRequest::new();
        let mut total = 0u128;
        for i in 0..3 {
            let note = Note::new(Amount(10 + i as u128), kp.clone(), &mut rng);
            let index = tree.insert(note.commitment()).unwrap();
            request = request.input(note.with_position(index));
            total += 10 + i as u128;
        }
        let change = Note::new(Amount(total), kp, &mut rng);
        let payload = request
            .output(change)
            .assemble(&tree, &TranscriptProver, &mut rng)
            .unwrap();

        assert_eq!(payload.public_inputs.nullifiers.len(), MAX_INPUTS);
        assert_eq!(payload.ext_data.ext_amount, 0);
        assert!(TranscriptProver.verify(&payload.proof, &payload.public_inputs));
    }
}
