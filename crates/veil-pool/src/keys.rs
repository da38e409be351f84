//! key material for pool participants
//!
//! a keypair bundles the spending public key with the note-encryption key.
//! the secret seed is optional: a keypair parsed from a shared address can
//! receive notes but cannot sign or decrypt (capability errors instead).

use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

const SPEND_KEY_DOMAIN: &[u8] = b"veil.pool.spend-key.v1";
const ENCRYPTION_KEY_DOMAIN: &[u8] = b"veil.pool.encryption-key.v1";
const SIGNING_DOMAIN: &[u8] = b"veil.pool.sig.v1";

/// human-shareable address prefix
pub const ADDRESS_PREFIX: &str = "veil1";

/// secret seed - root of the key hierarchy, never serialized
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct SecretSeed([u8; 32]);

impl core::fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SecretSeed(..)")
    }
}

/// public spending key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

/// signature binding a message to a spending key
/// sig = H(domain || signing_secret || pk || message), same scheme the
/// nullifier relation commits to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(pub [u8; 32]);

/// identity and note-encryption key material
///
/// two keypairs parsed from the same address compare equal; equality ignores
/// whether the secret half is present.
#[derive(Clone, Debug)]
pub struct Keypair {
    public: PublicKey,
    encryption: x25519_dalek::PublicKey,
    seed: Option<SecretSeed>,
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public && self.encryption.as_bytes() == other.encryption.as_bytes()
    }
}

impl Eq for Keypair {}

impl Keypair {
    /// fresh keypair from a cryptographically secure rng
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_secret(seed)
    }

    /// deterministic keypair from a 32-byte secret
    pub fn from_secret(seed: [u8; 32]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(SPEND_KEY_DOMAIN);
        hasher.update(&seed);
        let public = PublicKey(*hasher.finalize().as_bytes());

        let encryption = x25519_dalek::PublicKey::from(&encryption_secret(&seed));

        Self {
            public,
            encryption,
            seed: Some(SecretSeed(seed)),
        }
    }

    /// public-only keypair from a shared address string
    ///
    /// the result can own notes destined to it, but `sign` and note
    /// decryption fail with [`Error::MissingPrivateKey`].
    pub fn from_address(address: &str) -> Result<Self> {
        let hex_part = address
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| Error::InvalidAddress(format!("missing {ADDRESS_PREFIX} prefix")))?;
        let bytes = hex::decode(hex_part)
            .map_err(|e| Error::InvalidAddress(format!("invalid hex: {e}")))?;
        if bytes.len() != 64 {
            return Err(Error::InvalidAddress(format!(
                "expected 64 key bytes, got {}",
                bytes.len()
            )));
        }

        let mut public = [0u8; 32];
        let mut encryption = [0u8; 32];
        public.copy_from_slice(&bytes[..32]);
        encryption.copy_from_slice(&bytes[32..]);

        Ok(Self {
            public: PublicKey(public),
            encryption: x25519_dalek::PublicKey::from(encryption),
            seed: None,
        })
    }

    /// canonical address string: prefix + hex(spend pk || encryption pk)
    pub fn address(&self) -> String {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.public.0);
        bytes[32..].copy_from_slice(self.encryption.as_bytes());
        format!("{ADDRESS_PREFIX}{}", hex::encode(bytes))
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// key notes are encrypted to
    pub fn encryption_key(&self) -> &x25519_dalek::PublicKey {
        &self.encryption
    }

    /// whether the secret half is present (full keypair vs address-only)
    pub fn has_secret(&self) -> bool {
        self.seed.is_some()
    }

    /// sign a message with the spending secret
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let seed = self.seed.as_ref().ok_or(Error::MissingPrivateKey)?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(SIGNING_DOMAIN);
        hasher.update(&seed.0);
        hasher.update(&self.public.0);
        hasher.update(message);
        Ok(Signature(*hasher.finalize().as_bytes()))
    }

    /// x25519 secret for note decryption
    pub(crate) fn encryption_secret(&self) -> Result<x25519_dalek::StaticSecret> {
        let seed = self.seed.as_ref().ok_or(Error::MissingPrivateKey)?;
        Ok(encryption_secret(&seed.0))
    }
}

fn encryption_secret(seed: &[u8; 32]) -> x25519_dalek::StaticSecret {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ENCRYPTION_KEY_DOMAIN);
    hasher.update(seed);
    x25519_dalek::StaticSecret::from(*hasher.finalize().as_bytes())
}
