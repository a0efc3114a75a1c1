// Copyright (c) 2022 MASSA LABS <info@massa.net>

use super::ConsensusState;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_models::subround::SubroundId;
use spos_signature::{Bitmap, PublicKey};

/// Contributions needed to close the signature-related subrounds of a group of `group_size`
pub(crate) fn signature_threshold(group_size: usize) -> usize {
    group_size * 2 / 3 + 1
}

impl ConsensusState {
    /// Records that `pub_key` did its part of `subround`
    pub(crate) fn set_job_done(
        &mut self,
        pub_key: &PublicKey,
        subround: SubroundId,
        done: bool,
    ) -> ConsensusResult<()> {
        if !self.is_in_consensus_group(pub_key) {
            return Err(ConsensusError::InvalidEnvelope(format!(
                "{} is not in the consensus group of round {}",
                pub_key, self.round_index
            )));
        }
        self.job_done.insert((*pub_key, subround), done);
        Ok(())
    }

    pub(crate) fn job_done(&self, pub_key: &PublicKey, subround: SubroundId) -> bool {
        self.job_done
            .get(&(*pub_key, subround))
            .copied()
            .unwrap_or(false)
    }

    pub(crate) fn set_threshold(&mut self, subround: SubroundId, threshold: usize) {
        self.thresholds.insert(subround, threshold);
    }

    /// Threshold of `subround`, unreachable if it was never set for this round
    pub(crate) fn threshold(&self, subround: SubroundId) -> usize {
        self.thresholds.get(&subround).copied().unwrap_or(usize::MAX)
    }

    /// Number of group members that did their part of `subround`
    pub(crate) fn count_job_done(&self, subround: SubroundId) -> usize {
        self.consensus_group
            .iter()
            .filter(|key| self.job_done(key, subround))
            .count()
    }

    pub(crate) fn compute_threshold_reached(&self, subround: SubroundId) -> bool {
        self.count_job_done(subround) >= self.threshold(subround)
    }

    /// Bitmap with bit `i` set iff the `i`-th member did its part of `subround`
    pub(crate) fn generate_bitmap(&self, subround: SubroundId) -> Bitmap {
        let mut bitmap = Bitmap::new(self.consensus_group.len());
        for (index, key) in self.consensus_group.iter().enumerate() {
            if self.job_done(key, subround) {
                bitmap.set(index);
            }
        }
        bitmap
    }

    /// Whether every member selected by `bitmap` did its part of `subround`
    pub(crate) fn all_selected_done(&self, bitmap: &Bitmap, subround: SubroundId) -> bool {
        bitmap
            .selected(self.consensus_group.len())
            .all(|index| self.job_done(&self.consensus_group[index], subround))
    }
}
