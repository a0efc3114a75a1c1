// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Per-round consensus state shared by the chronology and the message worker.
//!
//! Everything here is reset at the beginning of every round by the start-round subround.
//! Callers hold the lock only for the duration of a single read or update.

mod contributions;

pub(crate) use contributions::signature_threshold;

use spos_consensus_exports::ConsensusVariant;
use spos_models::block::{BlockBody, BlockHeader};
use spos_models::message::MessageType;
use spos_models::subround::{SubroundId, SubroundStatus};
use spos_signature::{Bitmap, PublicKey};
use std::collections::HashMap;

/// Header and body proposed by the leader, as received, keyed by the fingerprint announced
/// in their envelopes
#[derive(Debug, Default)]
struct ProposalParts {
    header: Option<(Vec<u8>, BlockHeader)>,
    body: Option<(Vec<u8>, BlockBody)>,
}

pub(crate) struct ConsensusState {
    round_index: i64,
    self_pub_key: PublicKey,
    consensus_group: Vec<PublicKey>,
    job_done: HashMap<(PublicKey, SubroundId), bool>,
    thresholds: HashMap<SubroundId, usize>,
    statuses: HashMap<SubroundId, SubroundStatus>,
    /// fingerprint of the block under agreement, set once per round
    data: Option<Vec<u8>>,
    header: Option<BlockHeader>,
    body: Option<BlockBody>,
    proposal_parts: ProposalParts,
    bitmap: Option<Bitmap>,
    round_canceled: bool,
    /// first error that canceled the round
    failure: Option<String>,
}

impl ConsensusState {
    /// State of a node that did not start any round yet
    pub(crate) fn new(self_pub_key: PublicKey) -> Self {
        ConsensusState {
            round_index: i64::MIN,
            self_pub_key,
            consensus_group: Vec::new(),
            job_done: HashMap::new(),
            thresholds: HashMap::new(),
            statuses: HashMap::new(),
            data: None,
            header: None,
            body: None,
            proposal_parts: ProposalParts::default(),
            bitmap: None,
            round_canceled: false,
            failure: None,
        }
    }

    /// Forgets everything about the previous round
    pub(crate) fn reset_for_round(&mut self, round_index: i64) {
        self.round_index = round_index;
        self.consensus_group.clear();
        self.job_done.clear();
        self.thresholds.clear();
        self.statuses.clear();
        self.data = None;
        self.header = None;
        self.body = None;
        self.proposal_parts = ProposalParts::default();
        self.bitmap = None;
        self.round_canceled = false;
        self.failure = None;
    }

    /// Round the state was last reset for, `i64::MIN` before the first round
    pub(crate) fn round_index(&self) -> i64 {
        self.round_index
    }

    pub(crate) fn set_consensus_group(&mut self, group: Vec<PublicKey>) {
        self.consensus_group = group;
    }

    pub(crate) fn consensus_group(&self) -> &[PublicKey] {
        &self.consensus_group
    }

    /// First member of the group
    pub(crate) fn leader(&self) -> Option<&PublicKey> {
        self.consensus_group.first()
    }

    pub(crate) fn is_leader_in_current_round(&self) -> bool {
        self.leader() == Some(&self.self_pub_key)
    }

    /// Position of `pub_key` in the group
    pub(crate) fn index_of(&self, pub_key: &PublicKey) -> Option<usize> {
        self.consensus_group.iter().position(|key| key == pub_key)
    }

    pub(crate) fn self_index(&self) -> Option<usize> {
        self.index_of(&self.self_pub_key)
    }

    pub(crate) fn is_in_consensus_group(&self, pub_key: &PublicKey) -> bool {
        self.index_of(pub_key).is_some()
    }

    /// Moves `subround` to `status`. Returns true if the status changed.
    /// A finished or extended subround keeps its status until the next round.
    pub(crate) fn set_status(&mut self, subround: SubroundId, status: SubroundStatus) -> bool {
        let current = self.status(subround);
        if current == status || !current.can_become(status) {
            return false;
        }
        self.statuses.insert(subround, status);
        true
    }

    pub(crate) fn status(&self, subround: SubroundId) -> SubroundStatus {
        self.statuses.get(&subround).copied().unwrap_or_default()
    }

    pub(crate) fn is_finished(&self, subround: SubroundId) -> bool {
        self.status(subround) == SubroundStatus::Finished
    }

    /// Whether a message of `msg_type` can be applied given the local progress of the round
    pub(crate) fn can_proceed(&self, msg_type: MessageType, variant: ConsensusVariant) -> bool {
        match (msg_type, variant) {
            (MessageType::BlockBody | MessageType::BlockHeader, _) => {
                self.is_finished(SubroundId::START_ROUND)
            }
            (
                MessageType::CommitmentHash | MessageType::Bitmap | MessageType::Commitment,
                ConsensusVariant::Bls,
            ) => false,
            (MessageType::CommitmentHash | MessageType::Bitmap, ConsensusVariant::BellareNeven) => {
                self.is_finished(SubroundId::BLOCK)
            }
            (MessageType::Commitment, ConsensusVariant::BellareNeven) => {
                self.is_finished(SubroundId::BITMAP)
            }
            (MessageType::Signature, ConsensusVariant::BellareNeven) => {
                self.is_finished(SubroundId::COMMITMENT)
            }
            (MessageType::Signature, ConsensusVariant::Bls) => self.is_finished(SubroundId::BLOCK),
            (MessageType::Unknown, _) => false,
        }
    }

    pub(crate) fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Adopts the block under agreement. Only the first proposal of a round is kept.
    pub(crate) fn set_proposal(
        &mut self,
        data: Vec<u8>,
        header: BlockHeader,
        body: BlockBody,
    ) -> bool {
        if self.data.is_some() {
            return false;
        }
        self.data = Some(data);
        self.header = Some(header);
        self.body = Some(body);
        true
    }

    pub(crate) fn header(&self) -> Option<&BlockHeader> {
        self.header.as_ref()
    }

    pub(crate) fn body(&self) -> Option<&BlockBody> {
        self.body.as_ref()
    }

    /// Replaces the header once it carries the aggregated signature
    pub(crate) fn seal_header(&mut self, header: BlockHeader) {
        self.header = Some(header);
    }

    pub(crate) fn store_received_header(&mut self, fingerprint: Vec<u8>, header: BlockHeader) {
        self.proposal_parts.header = Some((fingerprint, header));
    }

    pub(crate) fn store_received_body(&mut self, fingerprint: Vec<u8>, body: BlockBody) {
        self.proposal_parts.body = Some((fingerprint, body));
    }

    /// Header and body received for the same fingerprint, if both arrived
    pub(crate) fn received_proposal(&self) -> Option<(Vec<u8>, BlockHeader, BlockBody)> {
        match (&self.proposal_parts.header, &self.proposal_parts.body) {
            (Some((header_fp, header)), Some((body_fp, body))) if header_fp == body_fp => {
                Some((header_fp.clone(), header.clone(), body.clone()))
            }
            _ => None,
        }
    }

    pub(crate) fn bitmap(&self) -> Option<&Bitmap> {
        self.bitmap.as_ref()
    }

    pub(crate) fn set_bitmap(&mut self, bitmap: Bitmap) {
        self.bitmap = Some(bitmap);
    }

    pub(crate) fn round_canceled(&self) -> bool {
        self.round_canceled
    }

    pub(crate) fn cancel_round(&mut self) {
        self.round_canceled = true;
    }

    /// Cancels the round. Only the first reason is kept.
    pub(crate) fn fail_round(&mut self, reason: String) {
        self.round_canceled = true;
        self.failure.get_or_insert(reason);
    }

    pub(crate) fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spos_signature::KeyPair;

    fn group_state(size: usize) -> (ConsensusState, Vec<PublicKey>) {
        let keys: Vec<PublicKey> = (0..size)
            .map(|_| KeyPair::generate().get_public_key())
            .collect();
        let mut state = ConsensusState::new(keys[0]);
        state.reset_for_round(3);
        state.set_consensus_group(keys.clone());
        (state, keys)
    }

    #[test]
    fn test_leader_is_first_member() {
        let (mut state, keys) = group_state(4);
        assert_eq!(state.leader(), Some(&keys[0]));
        assert!(state.is_leader_in_current_round());
        assert_eq!(state.index_of(&keys[2]), Some(2));
        state.set_consensus_group(vec![keys[1], keys[0]]);
        assert!(!state.is_leader_in_current_round());
        assert_eq!(state.self_index(), Some(1));
    }

    #[test]
    fn test_status_is_monotonic_within_round() {
        let (mut state, _) = group_state(4);
        assert_eq!(state.status(SubroundId::BLOCK), SubroundStatus::NotFinished);
        assert!(state.set_status(SubroundId::BLOCK, SubroundStatus::Extended));
        assert!(!state.set_status(SubroundId::BLOCK, SubroundStatus::Finished));
        assert_eq!(state.status(SubroundId::BLOCK), SubroundStatus::Extended);

        assert!(state.set_status(SubroundId::SIGNATURE, SubroundStatus::Finished));
        assert!(!state.set_status(SubroundId::SIGNATURE, SubroundStatus::Finished));

        state.reset_for_round(4);
        assert_eq!(state.status(SubroundId::BLOCK), SubroundStatus::NotFinished);
        assert!(state.consensus_group().is_empty());
    }

    #[test]
    fn test_first_failure_of_the_round_is_kept() {
        let (mut state, _) = group_state(4);
        state.fail_round("deadline exceeded".into());
        state.fail_round("commit failed".into());
        assert!(state.round_canceled());
        assert_eq!(state.failure(), Some("deadline exceeded"));

        state.reset_for_round(4);
        assert!(!state.round_canceled());
        assert_eq!(state.failure(), None);
    }

    #[test]
    fn test_can_proceed_follows_local_progress() {
        let (mut state, _) = group_state(4);
        let bn = ConsensusVariant::BellareNeven;
        let bls = ConsensusVariant::Bls;
        assert!(!state.can_proceed(MessageType::BlockHeader, bls));
        state.set_status(SubroundId::START_ROUND, SubroundStatus::Finished);
        assert!(state.can_proceed(MessageType::BlockHeader, bls));
        assert!(!state.can_proceed(MessageType::Signature, bls));

        state.set_status(SubroundId::BLOCK, SubroundStatus::Finished);
        assert!(state.can_proceed(MessageType::Signature, bls));
        assert!(!state.can_proceed(MessageType::CommitmentHash, bls));
        assert!(state.can_proceed(MessageType::CommitmentHash, bn));
        assert!(state.can_proceed(MessageType::Bitmap, bn));
        assert!(!state.can_proceed(MessageType::Commitment, bn));
        assert!(!state.can_proceed(MessageType::Signature, bn));

        state.set_status(SubroundId::BITMAP, SubroundStatus::Finished);
        assert!(state.can_proceed(MessageType::Commitment, bn));
        state.set_status(SubroundId::COMMITMENT, SubroundStatus::Finished);
        assert!(state.can_proceed(MessageType::Signature, bn));
        assert!(!state.can_proceed(MessageType::Unknown, bn));
    }

    #[test]
    fn test_first_proposal_wins() {
        let (mut state, _) = group_state(4);
        let header = spos_models::blockchain::Blockchain::new(
            spos_models::block::ShardId(0),
            spos_time::SposTime::from_millis(0),
            b"seed".to_vec(),
        )
        .unwrap()
        .genesis_header()
        .clone();
        assert!(state.set_proposal(vec![1], header.clone(), BlockBody::default()));
        assert!(!state.set_proposal(vec![2], header, BlockBody::default()));
        assert_eq!(state.data(), Some(&[1u8][..]));
    }

    #[test]
    fn test_received_parts_must_share_fingerprint() {
        let (mut state, _) = group_state(4);
        let header = spos_models::blockchain::Blockchain::new(
            spos_models::block::ShardId(0),
            spos_time::SposTime::from_millis(0),
            b"seed".to_vec(),
        )
        .unwrap()
        .genesis_header()
        .clone();
        state.store_received_header(vec![1], header);
        assert!(state.received_proposal().is_none());
        state.store_received_body(vec![2], BlockBody::default());
        assert!(state.received_proposal().is_none());
        state.store_received_body(vec![1], BlockBody::default());
        assert_eq!(state.received_proposal().map(|(fp, _, _)| fp), Some(vec![1]));
    }
}
