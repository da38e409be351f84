//! proving capability for the spend relation
//!
//! the zero-knowledge backend is external: [`Prover`] and [`Verifier`] are
//! the seam it plugs into. the relation proved is fixed:
//!
//! - every non-dummy spent note is a member of the tree at `root`
//! - every published nullifier is derived from its spent note
//! - every published commitment matches its output note
//! - `sum(spend amounts) + public_amount = sum(output amounts)`
//!
//! [`TranscriptProver`] is the reference backend used by the tests: it
//! checks the relation locally and emits a transcript binding of the public
//! input tuple, refusing to prove an ill-formed witness set.

use scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::merkle::{MerklePath, MerkleRoot};
use crate::note::{Amount, NoteCommitment, Nullifier};

const PROOF_DOMAIN: &[u8] = b"veil.pool.proof.v1";

/// opaque proof bytes
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Proof(pub Vec<u8>);

/// public input tuple the proof is verified against
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct PublicInputs {
    /// accumulator root the membership witnesses were built against
    pub root: MerkleRoot,
    /// net value crossing the pool boundary, after fee
    pub public_amount: i128,
    /// binding of the transaction metadata ([`crate::ExtData`])
    pub ext_data_hash: [u8; 32],
    /// spend tags, one per input (dummies included)
    pub nullifiers: Vec<Nullifier>,
    /// commitments of the created notes, in submitted (shuffled) order
    pub output_commitments: Vec<NoteCommitment>,
}

/// private witness for one spent note
#[derive(Clone, Debug)]
pub struct SpendWitness {
    pub amount: Amount,
    pub commitment: NoteCommitment,
    pub nullifier: Nullifier,
    pub path: MerklePath,
}

/// private witness for one created note
#[derive(Clone, Debug)]
pub struct OutputWitness {
    pub amount: Amount,
    pub commitment: NoteCommitment,
}

/// full witness set handed to the proving backend
#[derive(Clone, Debug)]
pub struct Witness {
    pub spends: Vec<SpendWitness>,
    pub outputs: Vec<OutputWitness>,
    pub public: PublicInputs,
}

pub trait Prover {
    /// prove the fixed relation; [`Error::ProvingFailed`] on an ill-formed
    /// witness set is a programming error, not a data error
    fn prove(&self, witness: &Witness) -> Result<Proof>;
}

pub trait Verifier {
    fn verify(&self, proof: &Proof, public: &PublicInputs) -> bool;
}

/// reference backend: local relation check + transcript binding
#[derive(Clone, Copy, Debug, Default)]
pub struct TranscriptProver;

impl TranscriptProver {
    fn binding(public: &PublicInputs) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(PROOF_DOMAIN);
        hasher.update(&public.encode());
        *hasher.finalize().as_bytes()
    }

    fn check_relation(witness: &Witness) -> Result<()> {
        let public = &witness.public;

        if witness.spends.len() != public.nullifiers.len() {
            return Err(Error::ProvingFailed("nullifier arity mismatch".into()));
        }
        if witness.outputs.len() != public.output_commitments.len() {
            return Err(Error::ProvingFailed("output arity mismatch".into()));
        }

        let mut sum_in: i128 = 0;
        for (spend, nullifier) in witness.spends.iter().zip(&public.nullifiers) {
            if spend.nullifier != *nullifier {
                return Err(Error::ProvingFailed("nullifier mismatch".into()));
            }
            // dummy spends carry no value and are exempt from membership
            if !spend.amount.is_zero() && !spend.path.verify(&spend.commitment, &public.root) {
                return Err(Error::ProvingFailed("membership witness invalid".into()));
            }
            sum_in = sum_in
                .checked_add(spend.amount.to_signed()?)
                .ok_or(Error::AmountOverflow)?;
        }

        let mut sum_out: i128 = 0;
        for (output, commitment) in witness.outputs.iter().zip(&public.output_commitments) {
            if output.commitment != *commitment {
                return Err(Error::ProvingFailed("output commitment mismatch".into()));
            }
            sum_out = sum_out
                .checked_add(output.amount.to_signed()?)
                .ok_or(Error::AmountOverflow)?;
        }

        let lhs = sum_in
            .checked_add(public.public_amount)
            .ok_or(Error::AmountOverflow)?;
        if lhs != sum_out {
            return Err(Error::ProvingFailed("value not conserved".into()));
        }

        Ok(())
    }
}

impl Prover for TranscriptProver {
    fn prove(&self, witness: &Witness) -> Result<Proof> {
        Self::check_relation(witness)?;
        Ok(Proof(Self::binding(&witness.public).to_vec()))
    }
}

impl Verifier for TranscriptProver {
    fn verify(&self, proof: &Proof, public: &PublicInputs) -> bool {
        proof.0 == Self::binding(public)
    }
}
