//! Keccak-256 Merkle tree over a state batch's roots.
//!
//! Leaves are the keccak hashes of the state roots, padded with the hash of
//! the zero word up to the next power of two. Parents hash the raw
//! concatenation `keccak(left || right)`, so sibling order matters and the
//! tree is always complete.

use ethereum_types::H256;
use keccak_hash::keccak;

#[derive(Debug, thiserror::Error)]
pub enum MerkleError {
    #[error("Cannot build a Merkle tree out of an empty element list")]
    EmptyTree,
    #[error("Requested proof index {0} is outside the tree")]
    IndexOutOfBounds(usize),
}

/// Root of the padded tree over `elements`, as committed on-chain for a
/// state batch. A single-element batch hashes straight to `keccak(element)`.
pub fn batch_root(elements: &[H256]) -> Result<H256, MerkleError> {
    let mut level = leaves(elements)?;
    while level.len() > 1 {
        level = next_level(&level);
    }
    level.into_iter().next().ok_or(MerkleError::EmptyTree)
}

/// Bottom-up sibling hashes proving `elements[index]` against the batch
/// root.
pub fn batch_proof(elements: &[H256], index: usize) -> Result<Vec<H256>, MerkleError> {
    if index >= elements.len() {
        return Err(MerkleError::IndexOutOfBounds(index));
    }

    let mut level = leaves(elements)?;
    let mut proof = Vec::new();
    let mut idx = index;

    while level.len() > 1 {
        // Levels always have even length, so the sibling exists.
        let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
        let sibling = level
            .get(sibling_idx)
            .copied()
            .ok_or(MerkleError::IndexOutOfBounds(sibling_idx))?;
        proof.push(sibling);

        level = next_level(&level);
        idx /= 2;
    }

    Ok(proof)
}

/// Folds `element`'s leaf up through `siblings` and compares the result
/// against `root`.
pub fn verify_batch_proof(element: H256, index: usize, siblings: &[H256], root: H256) -> bool {
    let mut node = keccak(element.as_bytes());
    let mut idx = index;
    for sibling in siblings {
        node = if idx % 2 == 0 {
            hash_pair(&node, sibling)
        } else {
            hash_pair(sibling, &node)
        };
        idx /= 2;
    }
    node == root
}

fn leaves(elements: &[H256]) -> Result<Vec<H256>, MerkleError> {
    if elements.is_empty() {
        return Err(MerkleError::EmptyTree);
    }
    let mut leaves: Vec<H256> = elements.iter().map(|e| keccak(e.as_bytes())).collect();
    leaves.resize(elements.len().next_power_of_two(), keccak([0u8; 32]));
    Ok(leaves)
}

fn next_level(level: &[H256]) -> Vec<H256> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => *single,
            _ => H256::zero(),
        })
        .collect()
}

fn hash_pair(left: &H256, right: &H256) -> H256 {
    keccak([left.as_bytes(), right.as_bytes()].concat())
}
