// ============ Avvy Commitment Library ============
// Pure building blocks for the commit-reveal workflows:
// - commitment hashes over ordered item records
// - salt generation
// - stable batching of oversized carts
//
// Nothing here performs I/O or mutates shared state.

use avvy_types::{BundleKind, Hash32, Item, ItemValue, ProofPair, Salt};

// ============ Error Types ============

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitmentError {
    #[error("cannot commit to an empty batch")]
    EmptyBatch,
    #[error("{items} items but {proofs} proof pairs")]
    LengthMismatch { items: usize, proofs: usize },
    #[error("item {index} carries the wrong value kind for a {kind:?} commitment")]
    ValueKind { index: usize, kind: BundleKind },
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
}

// ============ Commitment Module ============

pub mod commit {
    use super::*;
    use sha2::{Digest, Sha256};

    const COMMIT_DOMAIN: &[u8] = b"avvy-commit-v1";
    const BATCH_DOMAIN: &[u8] = b"avvy-batch-v1";

    /// Hash binding an ordered batch of items (and, for registrations,
    /// their proofs) to a salt.
    ///
    /// Layout: SHA-256(domain || kind || count || records... || salt), where a
    /// record is name_hash || value (u128 LE) || [len || pricing || len || constraints].
    /// Reordering items changes the hash; the reveal must present them in
    /// commit order.
    pub fn build_commitment_hash(
        kind: BundleKind,
        items: &[Item],
        proofs: &[ProofPair],
        salt: &Salt,
    ) -> Result<Hash32, CommitmentError> {
        if items.is_empty() {
            return Err(CommitmentError::EmptyBatch);
        }

        match kind {
            BundleKind::Auction if !proofs.is_empty() => {
                return Err(CommitmentError::LengthMismatch {
                    items: items.len(),
                    proofs: proofs.len(),
                });
            }
            BundleKind::Registration if proofs.len() != items.len() => {
                return Err(CommitmentError::LengthMismatch {
                    items: items.len(),
                    proofs: proofs.len(),
                });
            }
            _ => {}
        }

        for (index, item) in items.iter().enumerate() {
            let matches = matches!(
                (kind, item.value),
                (BundleKind::Auction, ItemValue::Amount(_))
                    | (BundleKind::Registration, ItemValue::Quantity(_))
            );
            if !matches {
                return Err(CommitmentError::ValueKind { index, kind });
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(COMMIT_DOMAIN);
        hasher.update([kind.tag()]);
        hasher.update((items.len() as u32).to_le_bytes());

        for (index, item) in items.iter().enumerate() {
            hasher.update(item.name.hash().as_bytes());
            hasher.update(item.value.as_u128().to_le_bytes());
            if let Some(pair) = proofs.get(index) {
                hasher.update((pair.pricing.as_bytes().len() as u32).to_le_bytes());
                hasher.update(pair.pricing.as_bytes());
                hasher.update((pair.constraints.as_bytes().len() as u32).to_le_bytes());
                hasher.update(pair.constraints.as_bytes());
            }
        }

        hasher.update(salt.as_bytes());
        Ok(Hash32(hasher.finalize().into()))
    }

    /// Salt-free identity of an ordered batch. Two commits of the same
    /// batch share it even though each draws its own salt.
    pub fn batch_key(kind: BundleKind, items: &[Item]) -> Hash32 {
        let mut hasher = Sha256::new();
        hasher.update(BATCH_DOMAIN);
        hasher.update([kind.tag()]);
        hasher.update((items.len() as u32).to_le_bytes());
        for item in items {
            hasher.update(item.name.hash().as_bytes());
            hasher.update(item.value.as_u128().to_le_bytes());
        }
        Hash32(hasher.finalize().into())
    }

    /// Sealed bids commit without proofs
    pub fn bid_commitment(items: &[Item], salt: &Salt) -> Result<Hash32, CommitmentError> {
        build_commitment_hash(BundleKind::Auction, items, &[], salt)
    }

    pub fn registration_commitment(
        items: &[Item],
        proofs: &[ProofPair],
        salt: &Salt,
    ) -> Result<Hash32, CommitmentError> {
        build_commitment_hash(BundleKind::Registration, items, proofs, salt)
    }

    /// Recompute and compare against a recorded commitment
    pub fn opens_to(
        expected: &Hash32,
        kind: BundleKind,
        items: &[Item],
        proofs: &[ProofPair],
        salt: &Salt,
    ) -> Result<bool, CommitmentError> {
        Ok(build_commitment_hash(kind, items, proofs, salt)? == *expected)
    }
}

// ============ Salt Module ============

pub mod salt {
    use super::*;
    use rand::RngCore;

    pub fn generate_salt() -> Salt {
        generate_salt_with(&mut rand::thread_rng())
    }

    pub fn generate_salt_with<R: RngCore + ?Sized>(rng: &mut R) -> Salt {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Salt(bytes)
    }
}

// ============ Batch Module ============

pub mod batch {
    use super::*;

    /// Stable partition into consecutive batches of at most `max` items.
    /// Concatenating the result yields the input unchanged.
    pub fn split_into_batches<T: Clone>(items: &[T], max: usize) -> Result<Vec<Vec<T>>, CommitmentError> {
        if max == 0 {
            return Err(CommitmentError::ZeroBatchSize);
        }
        Ok(items.chunks(max).map(<[T]>::to_vec).collect())
    }

    /// Leading batch plus whether anything is left over
    pub fn next_batch<T: Clone>(items: &[T], max: usize) -> Result<(Vec<T>, bool), CommitmentError> {
        if max == 0 {
            return Err(CommitmentError::ZeroBatchSize);
        }
        let take = items.len().min(max);
        Ok((items[..take].to_vec(), items.len() > max))
    }
}

pub use batch::{next_batch, split_into_batches};
pub use commit::{batch_key, bid_commitment, build_commitment_hash, opens_to, registration_commitment};
pub use salt::{generate_salt, generate_salt_with};

// ============ Tests ============
