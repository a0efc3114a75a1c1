// Copyright (c) 2022 MASSA LABS <info@massa.net>

use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_consensus_exports::ValidatorGroupSelector;
use spos_hash::Hash;
use spos_signature::PublicKey;

/// Draws the consensus group among a fixed list of eligible validators.
///
/// Draw `i` picks `blake3(seed || round || i) mod len(eligible)`, skipping validators that are
/// already in the group. Every node holding the same list and seed draws the same group.
pub struct IndexHashedGroupSelector {
    eligible: Vec<PublicKey>,
    group_size: usize,
}

impl IndexHashedGroupSelector {
    /// Selector drawing `group_size` members out of `eligible`
    pub fn new(eligible: Vec<PublicKey>, group_size: usize) -> ConsensusResult<Self> {
        if group_size == 0 || group_size > eligible.len() {
            return Err(ConsensusError::ConfigError(format!(
                "cannot draw {} validators out of {}",
                group_size,
                eligible.len()
            )));
        }
        Ok(IndexHashedGroupSelector {
            eligible,
            group_size,
        })
    }

    fn draw(&self, rand_seed: &[u8], round_index: i64, attempt: u64) -> usize {
        let hash = Hash::compute_from_tuple(&[
            rand_seed,
            &round_index.to_be_bytes(),
            &attempt.to_be_bytes(),
        ]);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.to_bytes()[..8]);
        (u64::from_be_bytes(prefix) % self.eligible.len() as u64) as usize
    }
}

impl ValidatorGroupSelector for IndexHashedGroupSelector {
    fn compute_validators_group(
        &self,
        rand_seed: &[u8],
        round_index: i64,
    ) -> ConsensusResult<Vec<PublicKey>> {
        let mut taken = vec![false; self.eligible.len()];
        let mut group = Vec::with_capacity(self.group_size);
        let max_attempts = (self.group_size as u64).saturating_mul(16);
        let mut attempt = 0u64;
        while group.len() < self.group_size && attempt < max_attempts {
            let index = self.draw(rand_seed, round_index, attempt);
            attempt += 1;
            if !taken[index] {
                taken[index] = true;
                group.push(self.eligible[index]);
            }
        }
        // too many collisions: fill in list order
        for (index, key) in self.eligible.iter().enumerate() {
            if group.len() == self.group_size {
                break;
            }
            if !taken[index] {
                taken[index] = true;
                group.push(*key);
            }
        }
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spos_signature::KeyPair;
    use std::collections::HashSet;

    fn eligible(count: usize) -> Vec<PublicKey> {
        (0..count)
            .map(|_| KeyPair::generate().get_public_key())
            .collect()
    }

    #[test]
    fn test_group_is_deterministic_and_distinct() {
        let keys = eligible(30);
        let selector = IndexHashedGroupSelector::new(keys.clone(), 21).unwrap();
        let group = selector.compute_validators_group(b"seed", 7).unwrap();
        assert_eq!(group.len(), 21);
        assert_eq!(group.iter().collect::<HashSet<_>>().len(), 21);
        assert!(group.iter().all(|key| keys.contains(key)));
        assert_eq!(group, selector.compute_validators_group(b"seed", 7).unwrap());
    }

    #[test]
    fn test_whole_list_is_a_permutation() {
        let keys = eligible(4);
        let selector = IndexHashedGroupSelector::new(keys.clone(), 4).unwrap();
        let mut group = selector.compute_validators_group(b"seed", 0).unwrap();
        group.sort();
        let mut sorted = keys;
        sorted.sort();
        assert_eq!(group, sorted);
    }

    #[test]
    fn test_leader_changes_with_round() {
        let keys = eligible(50);
        let selector = IndexHashedGroupSelector::new(keys, 1).unwrap();
        let leaders: HashSet<PublicKey> = (0..20)
            .map(|round| selector.compute_validators_group(b"seed", round).unwrap()[0])
            .collect();
        assert!(leaders.len() > 1);
    }

    #[test]
    fn test_rejects_oversized_group() {
        assert!(IndexHashedGroupSelector::new(eligible(3), 4).is_err());
        assert!(IndexHashedGroupSelector::new(eligible(3), 0).is_err());
    }
}
