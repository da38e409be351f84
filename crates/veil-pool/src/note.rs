//! shielded notes (utxos)
//!
//! a note is a private value record bound to an owner keypair. publicly it
//! is only ever identified by its commitment; spending it publishes a
//! nullifier derived from the owner's signature over commitment + position.

use std::cell::OnceCell;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::{CryptoRng, RngCore};
use scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::Keypair;
use crate::{NOTE_DOMAIN, NULLIFIER_DOMAIN};

const NOTE_ENCRYPTION_DOMAIN: &[u8] = b"veil.pool.note-encryption.v1";

/// plaintext layout: amount (16 le bytes) || blinding (32 bytes)
const PLAINTEXT_LEN: usize = 48;
/// ciphertext layout: ephemeral pk (32) || nonce (12) || aead ct (48 + 16 tag)
const CIPHERTEXT_LEN: usize = 32 + 12 + PLAINTEXT_LEN + 16;

/// note amount, in the pool's base unit
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
    Encode, Decode, Serialize, Deserialize,
)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// signed view, for balance arithmetic
    pub fn to_signed(self) -> Result<i128> {
        i128::try_from(self.0).map_err(|_| Error::AmountOverflow)
    }
}

impl From<u128> for Amount {
    fn from(v: u128) -> Self {
        Self(v)
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(v as u128)
    }
}

/// commitment to a note (what goes in the accumulator)
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize,
)]
pub struct NoteCommitment(pub [u8; 32]);

impl NoteCommitment {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl AsRef<[u8]> for NoteCommitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// unique spend tag for an anchored note
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize,
)]
pub struct Nullifier(pub [u8; 32]);

impl Nullifier {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

/// a shielded note
///
/// immutable value object: anchoring returns a new note via
/// [`Note::with_position`]. the commitment is computed once at construction;
/// the nullifier is computed on first use and cached.
#[derive(Clone, Debug)]
pub struct Note {
    pub amount: Amount,
    pub keypair: Keypair,
    pub blinding: [u8; 32],
    pub leaf_index: Option<u64>,
    commitment: NoteCommitment,
    nullifier: OnceCell<Nullifier>,
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.amount == other.amount
            && self.keypair == other.keypair
            && self.blinding == other.blinding
            && self.leaf_index == other.leaf_index
    }
}

impl Eq for Note {}

impl Note {
    /// new unanchored note with fresh random blinding
    pub fn new<R: RngCore + CryptoRng>(amount: Amount, keypair: Keypair, rng: &mut R) -> Self {
        let mut blinding = [0u8; 32];
        rng.fill_bytes(&mut blinding);
        Self::with_blinding(amount, keypair, blinding)
    }

    /// new unanchored note with caller-fixed blinding
    pub fn with_blinding(amount: Amount, keypair: Keypair, blinding: [u8; 32]) -> Self {
        let commitment = commit(amount, &keypair, &blinding);
        Self {
            amount,
            keypair,
            blinding,
            leaf_index: None,
            commitment,
            nullifier: OnceCell::new(),
        }
    }

    /// anchored copy of this note at the given accumulator position
    pub fn with_position(&self, leaf_index: u64) -> Self {
        Self {
            amount: self.amount,
            keypair: self.keypair.clone(),
            blinding: self.blinding,
            leaf_index: Some(leaf_index),
            commitment: self.commitment,
            nullifier: OnceCell::new(),
        }
    }

    pub fn commitment(&self) -> NoteCommitment {
        self.commitment
    }

    /// spend tag: H(commitment || position || sig(commitment || position))
    ///
    /// requires the note to be anchored and the owner secret to be present.
    pub fn nullifier(&self) -> Result<Nullifier> {
        if let Some(nf) = self.nullifier.get() {
            return Ok(*nf);
        }

        let index = self.leaf_index.ok_or(Error::NotAnchored)?;

        let mut message = [0u8; 40];
        message[..32].copy_from_slice(&self.commitment.0);
        message[32..].copy_from_slice(&index.to_le_bytes());
        let signature = self.keypair.sign(&message)?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(NULLIFIER_DOMAIN);
        hasher.update(&self.commitment.0);
        hasher.update(&index.to_le_bytes());
        hasher.update(&signature.0);
        let nf = Nullifier(*hasher.finalize().as_bytes());

        let _ = self.nullifier.set(nf);
        Ok(nf)
    }

    /// encrypt `(amount, blinding)` to the owner's encryption key
    ///
    /// only the owner's public half is needed, so anyone can produce the
    /// payload for a note destined to someone else.
    pub fn encrypt<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Vec<u8>> {
        let ephemeral = x25519_dalek::EphemeralSecret::random_from_rng(&mut *rng);
        let ephemeral_pk = x25519_dalek::PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(self.keypair.encryption_key());

        let key = encryption_key(
            shared.as_bytes(),
            ephemeral_pk.as_bytes(),
            self.keypair.encryption_key().as_bytes(),
        );

        let mut nonce = [0u8; 12];
        rng.fill_bytes(&mut nonce);

        let mut plaintext = [0u8; PLAINTEXT_LEN];
        plaintext[..16].copy_from_slice(&self.amount.0.to_le_bytes());
        plaintext[16..].copy_from_slice(&self.blinding);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|_| Error::EncryptionFailed)?;

        let mut out = Vec::with_capacity(CIPHERTEXT_LEN);
        out.extend_from_slice(ephemeral_pk.as_bytes());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// reconstruct a note from an encrypted payload and its assigned position
    ///
    /// fails with [`Error::DecryptionFailed`] for a non-matching keypair or a
    /// corrupted payload (the aead tag makes the failure unambiguous), and
    /// with [`Error::MissingPrivateKey`] for an address-only keypair.
    pub fn decrypt(keypair: &Keypair, ciphertext: &[u8], leaf_index: u64) -> Result<Self> {
        let secret = keypair.encryption_secret()?;

        if ciphertext.len() != CIPHERTEXT_LEN {
            return Err(Error::DecryptionFailed);
        }

        let mut ephemeral_pk = [0u8; 32];
        ephemeral_pk.copy_from_slice(&ciphertext[..32]);
        let ephemeral_pk = x25519_dalek::PublicKey::from(ephemeral_pk);
        let nonce = &ciphertext[32..44];
        let sealed = &ciphertext[44..];

        let shared = secret.diffie_hellman(&ephemeral_pk);
        let key = encryption_key(
            shared.as_bytes(),
            ephemeral_pk.as_bytes(),
            keypair.encryption_key().as_bytes(),
        );

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| Error::DecryptionFailed)?;
        if plaintext.len() != PLAINTEXT_LEN {
            return Err(Error::DecryptionFailed);
        }

        let mut amount = [0u8; 16];
        amount.copy_from_slice(&plaintext[..16]);
        let mut blinding = [0u8; 32];
        blinding.copy_from_slice(&plaintext[16..]);

        Ok(Self::with_blinding(
            Amount(u128::from_le_bytes(amount)),
            keypair.clone(),
            blinding,
        )
        .with_position(leaf_index))
    }

    /// trial-decrypt a batch of `(ciphertext, leaf index)` candidates
    ///
    /// output order is randomized per transaction before anchoring, so a
    /// recipient must try every slot in the batch; the first success wins.
    pub fn decrypt_any<'a, I>(keypair: &Keypair, candidates: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a [u8], u64)>,
    {
        if !keypair.has_secret() {
            return Err(Error::MissingPrivateKey);
        }
        for (ciphertext, leaf_index) in candidates {
            if let Ok(note) = Self::decrypt(keypair, ciphertext, leaf_index) {
                return Ok(note);
            }
        }
        Err(Error::DecryptionFailed)
    }
}

fn commit(amount: Amount, keypair: &Keypair, blinding: &[u8; 32]) -> NoteCommitment {
    let mut hasher = blake3::Hasher::new();
    hasher.update(NOTE_DOMAIN);
    hasher.update(&amount.0.to_le_bytes());
    hasher.update(&keypair.public_key().0);
    hasher.update(blinding);
    NoteCommitment(*hasher.finalize().as_bytes())
}

fn encryption_key(shared: &[u8; 32], ephemeral_pk: &[u8; 32], recipient_pk: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(NOTE_ENCRYPTION_DOMAIN);
    hasher.update(shared);
    hasher.update(ephemeral_pk);
    hasher.update(recipient_pk);
    *hasher.finalize().as_bytes()
}
