//! Order-preserving aggregation of block digests.
//!
//! Workers finish blocks in any order. The aggregator places each result in
//! the slot for its index and, once every slot is filled, folds the digests
//! in index order `0..N` into the whole-file digest.

use crate::BlockDigest;
use crate::digest::DigestAlgorithm;
use crate::error::{HashgenError, Result};

/// Collects exactly `expected` block digests for one file
#[derive(Debug)]
pub struct Aggregator {
    algorithm: DigestAlgorithm,
    slots: Vec<Option<Vec<u8>>>,
    received: u64,
}

impl Aggregator {
    /// Create an aggregator expecting `expected` block digests
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm, expected: u64) -> Self {
        Self {
            algorithm,
            slots: vec![None; expected as usize],
            received: 0,
        }
    }

    /// Number of digests the aggregator is waiting for in total
    #[must_use]
    pub fn expected(&self) -> u64 {
        self.slots.len() as u64
    }

    /// Number of digests received so far
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Whether every slot has been filled
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.received == self.expected()
    }

    /// Record one block digest
    ///
    /// # Errors
    ///
    /// Returns [`HashgenError::BlockOrder`] if the index is out of range or
    /// was already recorded.
    pub fn insert(&mut self, result: BlockDigest) -> Result<()> {
        let expected = self.expected();
        let slot = self
            .slots
            .get_mut(result.index as usize)
            .filter(|slot| slot.is_none())
            .ok_or(HashgenError::BlockOrder {
                index: result.index,
                expected,
            })?;

        *slot = Some(result.digest);
        self.received += 1;
        Ok(())
    }

    /// Fold the digests in index order and return the lowercase hex result
    ///
    /// # Errors
    ///
    /// Returns [`HashgenError::BlockOrder`] naming the first missing index if
    /// the aggregator is incomplete.
    pub fn finish(self) -> Result<String> {
        let expected = self.expected();
        let mut hasher = self.algorithm.hasher();

        for (index, slot) in self.slots.into_iter().enumerate() {
            let digest = slot.ok_or(HashgenError::BlockOrder {
                index: index as u64,
                expected,
            })?;
            hasher.update(&digest);
        }

        Ok(hasher.finalize_hex())
    }
}

/// Whole-file digest computed single-threaded from block digests already in
/// index order
#[must_use]
pub fn fold_in_order<'a, I>(algorithm: DigestAlgorithm, digests: I) -> String
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = algorithm.hasher();
    for digest in digests {
        hasher.update(digest);
    }
    hasher.finalize_hex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;

    fn block_digests(algorithm: DigestAlgorithm, data: &[u8], block_size: usize) -> Vec<BlockDigest> {
        data.chunks(block_size)
            .enumerate()
            .map(|(i, chunk)| BlockDigest {
                index: i as u64,
                digest: algorithm.digest(chunk),
            })
            .collect()
    }

    #[test]
    fn test_empty_aggregate_is_empty_digest() {
        let aggregator = Aggregator::new(DigestAlgorithm::Sha1, 0);
        assert!(aggregator.is_complete());
        assert_eq!(
            aggregator.finish().unwrap(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn test_reverse_arrival_matches_in_order() {
        let algorithm = DigestAlgorithm::Sha1;
        let results = block_digests(algorithm, &[7u8; 100], 16);
        let reference = fold_in_order(algorithm, results.iter().map(|r| r.digest.as_slice()));

        let mut aggregator = Aggregator::new(algorithm, results.len() as u64);
        for result in results.into_iter().rev() {
            aggregator.insert(result).unwrap();
        }
        assert_eq!(aggregator.finish().unwrap(), reference);
    }

    #[test]
    fn test_order_sensitive() {
        let algorithm = DigestAlgorithm::Sha1;
        let a = algorithm.digest(b"first");
        let b = algorithm.digest(b"second");
        assert_ne!(
            fold_in_order(algorithm, [a.as_slice(), b.as_slice()]),
            fold_in_order(algorithm, [b.as_slice(), a.as_slice()])
        );
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let mut aggregator = Aggregator::new(DigestAlgorithm::Sha1, 2);
        let result = BlockDigest {
            index: 1,
            digest: vec![0; 20],
        };
        aggregator.insert(result.clone()).unwrap();
        assert!(matches!(
            aggregator.insert(result),
            Err(HashgenError::BlockOrder { index: 1, expected: 2 })
        ));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut aggregator = Aggregator::new(DigestAlgorithm::Sha1, 2);
        let result = BlockDigest {
            index: 2,
            digest: vec![0; 20],
        };
        assert!(aggregator.insert(result).is_err());
        assert_eq!(aggregator.received(), 0);
    }

    #[test]
    fn test_incomplete_finish_names_missing_index() {
        let mut aggregator = Aggregator::new(DigestAlgorithm::Sha1, 3);
        aggregator
            .insert(BlockDigest {
                index: 0,
                digest: vec![1; 20],
            })
            .unwrap();
        aggregator
            .insert(BlockDigest {
                index: 2,
                digest: vec![2; 20],
            })
            .unwrap();
        assert!(!aggregator.is_complete());
        assert!(matches!(
            aggregator.finish(),
            Err(HashgenError::BlockOrder { index: 1, expected: 3 })
        ));
    }

    proptest! {
        #[test]
        fn prop_any_arrival_order_gives_same_digest(
            data in proptest::collection::vec(any::<u8>(), 1..2048),
            block_size in 1usize..256,
            seed in any::<u64>(),
        ) {
            let algorithm = DigestAlgorithm::Sha1;
            let mut results = block_digests(algorithm, &data, block_size);
            let reference = fold_in_order(algorithm, results.iter().map(|r| r.digest.as_slice()));

            results.shuffle(&mut SmallRng::seed_from_u64(seed));
            let mut aggregator = Aggregator::new(algorithm, results.len() as u64);
            for result in results {
                aggregator.insert(result).unwrap();
            }
            prop_assert_eq!(aggregator.finish().unwrap(), reference);
        }
    }
}
