// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Capabilities the consensus engine consumes from the rest of the node

use crate::error::ConsensusResult;
use spos_channel::sender::SposSender;
use spos_models::block::{BlockBody, BlockHeader, ShardId};
use spos_models::blockchain::Blockchain;
use spos_signature::PublicKey;
use std::collections::BTreeMap;

/// Gossip layer: publishes bytes on named topics
#[cfg_attr(feature = "test-exports", mockall::automock)]
pub trait Messenger: Send + Sync {
    /// Publishes `data` on `topic`
    fn broadcast(&self, topic: &str, data: Vec<u8>) -> ConsensusResult<()>;

    /// Delivers every message later received on `topic` to `sender`
    fn subscribe(&self, topic: &str, sender: SposSender<Vec<u8>>) -> ConsensusResult<()>;
}

/// Serialized cross-shard artifacts of a committed block, keyed by destination shard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrossShardData {
    /// serialized mini-blocks
    pub mini_blocks: BTreeMap<ShardId, Vec<u8>>,
    /// serialized transactions
    pub transactions: BTreeMap<ShardId, Vec<Vec<u8>>>,
}

/// Block production, execution and storage.
///
/// `have_time` returns false once the processing budget of the round is spent; long
/// operations must poll it and give up.
pub trait BlockProcessor: Send + Sync {
    /// Builds the body of a new block
    fn create_block_body(
        &self,
        round_index: i64,
        have_time: &dyn Fn() -> bool,
    ) -> ConsensusResult<BlockBody>;

    /// Builds a header for `body`. The chain-derived fields (nonce, parent, seeds, shard and
    /// time stamp) are filled by consensus afterwards.
    fn create_block_header(
        &self,
        body: &BlockBody,
        round_index: i64,
        have_time: &dyn Fn() -> bool,
    ) -> ConsensusResult<BlockHeader>;

    /// Executes a proposed block on top of `chain`
    fn process_block(
        &self,
        chain: &Blockchain,
        header: &BlockHeader,
        body: &BlockBody,
        have_time: &dyn Fn() -> bool,
    ) -> ConsensusResult<()>;

    /// Stores a sealed block on top of `chain`
    fn commit_block(
        &self,
        chain: &Blockchain,
        header: &BlockHeader,
        body: &BlockBody,
    ) -> ConsensusResult<()>;

    /// Discards the state changes of the last processed block
    fn revert_account_state(&self);

    /// Cross-shard artifacts of a committed block
    fn marshalized_data_to_broadcast(
        &self,
        header: &BlockHeader,
        body: &BlockBody,
    ) -> ConsensusResult<CrossShardData>;
}

/// Draws the consensus group of a round
#[cfg_attr(feature = "test-exports", mockall::automock)]
pub trait ValidatorGroupSelector: Send + Sync {
    /// Ordered consensus group of `round_index`. The first member leads the round.
    fn compute_validators_group(
        &self,
        rand_seed: &[u8],
        round_index: i64,
    ) -> ConsensusResult<Vec<PublicKey>>;
}
