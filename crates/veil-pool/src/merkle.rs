//! append-only merkle accumulator over note commitments
//!
//! fixed height, zero-subtree padding. the client instance mirrors the
//! ledger's authoritative tree and is rebuilt from the ledger's event log
//! whenever the two may have diverged; both sides must agree on every root,
//! including the empty one, so the empty root is the genuine all-zero-leaf
//! root rather than a sentinel.

use scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::note::NoteCommitment;
use crate::MERKLE_DOMAIN;

/// root of the accumulator - a pure function of the ordered leaf sequence
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize,
)]
pub struct MerkleRoot(pub [u8; 32]);

impl MerkleRoot {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

/// membership witness: ordered sibling hashes from leaf to root
#[derive(Clone, Debug)]
pub struct MerklePath {
    pub siblings: Vec<[u8; 32]>,
    pub index: u64,
}

impl MerklePath {
    /// fold the path and compare against the expected root
    pub fn verify(&self, commitment: &NoteCommitment, root: &MerkleRoot) -> bool {
        let mut current = commitment.0;
        let mut pos = self.index;

        for sibling in &self.siblings {
            current = if pos & 1 == 0 {
                hash_node(&current, sibling)
            } else {
                hash_node(sibling, &current)
            };
            pos >>= 1;
        }

        current == root.0
    }
}

/// fixed-height accumulator with `2^height` leaf capacity
pub struct MerkleTree {
    height: usize,
    leaves: Vec<NoteCommitment>,
    /// zero-subtree hash per level, zeros[0] = empty leaf
    zeros: Vec<[u8; 32]>,
}

impl MerkleTree {
    /// empty tree of the given height (1..=32)
    pub fn new(height: usize) -> Self {
        assert!((1..=32).contains(&height), "tree height out of range");

        let mut zeros = Vec::with_capacity(height + 1);
        zeros.push([0u8; 32]);
        for level in 0..height {
            let z = zeros[level];
            zeros.push(hash_node(&z, &z));
        }

        Self {
            height,
            leaves: Vec::new(),
            zeros,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.height
    }

    pub fn len(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// append a commitment, returning its assigned leaf index
    pub fn insert(&mut self, commitment: NoteCommitment) -> Result<u64> {
        if self.len() == self.capacity() {
            return Err(Error::TreeFull);
        }
        self.leaves.push(commitment);
        Ok(self.len() - 1)
    }

    /// current root
    pub fn root(&self) -> MerkleRoot {
        let mut level: Vec<[u8; 32]> = self.leaves.iter().map(|c| c.0).collect();

        for l in 0..self.height {
            if level.is_empty() {
                return MerkleRoot(self.zeros[self.height]);
            }
            if level.len() % 2 == 1 {
                level.push(self.zeros[l]);
            }
            level = level
                .chunks(2)
                .map(|pair| hash_node(&pair[0], &pair[1]))
                .collect();
        }

        MerkleRoot(level[0])
    }

    /// membership witness for an inserted leaf
    pub fn witness(&self, leaf_index: u64) -> Result<MerklePath> {
        if leaf_index >= self.len() {
            return Err(Error::UnknownLeaf(leaf_index));
        }

        let mut siblings = Vec::with_capacity(self.height);
        let mut level: Vec<[u8; 32]> = self.leaves.iter().map(|c| c.0).collect();
        let mut pos = leaf_index as usize;

        for l in 0..self.height {
            if level.len() % 2 == 1 {
                level.push(self.zeros[l]);
            }
            siblings.push(level[pos ^ 1]);
            level = level
                .chunks(2)
                .map(|pair| hash_node(&pair[0], &pair[1]))
                .collect();
            pos >>= 1;
        }

        Ok(MerklePath {
            siblings,
            index: leaf_index,
        })
    }

    /// all-zero sibling path, used for zero-amount dummy spends whose
    /// membership the proving relation does not check
    pub fn empty_path(&self) -> MerklePath {
        MerklePath {
            siblings: vec![[0u8; 32]; self.height],
            index: 0,
        }
    }

    /// commitment stored at a leaf, if any
    pub fn leaf(&self, leaf_index: u64) -> Option<NoteCommitment> {
        self.leaves.get(leaf_index as usize).copied()
    }
}

fn hash_node(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(MERKLE_DOMAIN);
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}
