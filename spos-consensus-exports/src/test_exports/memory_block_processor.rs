// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::{ConsensusError, ConsensusResult};
use crate::{BlockProcessor, CrossShardData};
use parking_lot::Mutex;
use spos_hash::Hash;
use spos_models::block::{BlockBody, BlockHeader, MiniBlock, MiniBlockSerializer, ShardId};
use spos_models::blockchain::Blockchain;
use spos_serialization::Serializer;
use spos_time::SposTime;
use std::sync::Arc;

#[derive(Default)]
struct ProcessorState {
    mini_blocks: Vec<MiniBlock>,
    processed: Vec<BlockHeader>,
    committed: Vec<BlockHeader>,
    reverts: usize,
    fail_commits: bool,
}

/// Block processor keeping everything in memory.
/// Proposes a body made of the configured mini-blocks and records processed and committed headers.
#[derive(Clone, Default)]
pub struct MemoryBlockProcessor {
    state: Arc<Mutex<ProcessorState>>,
}

impl MemoryBlockProcessor {
    /// Processor proposing empty bodies
    pub fn new() -> Self {
        Self::default()
    }

    /// Mini-blocks put in every proposed body
    pub fn set_mini_blocks(&self, mini_blocks: Vec<MiniBlock>) {
        self.state.lock().mini_blocks = mini_blocks;
    }

    /// Makes every following commit fail
    pub fn set_fail_commits(&self, fail: bool) {
        self.state.lock().fail_commits = fail;
    }

    /// Headers committed so far
    pub fn committed(&self) -> Vec<BlockHeader> {
        self.state.lock().committed.clone()
    }

    /// Headers processed so far
    pub fn processed(&self) -> Vec<BlockHeader> {
        self.state.lock().processed.clone()
    }

    /// Number of `revert_account_state` calls
    pub fn reverts(&self) -> usize {
        self.state.lock().reverts
    }
}

impl BlockProcessor for MemoryBlockProcessor {
    fn create_block_body(
        &self,
        _round_index: i64,
        _have_time: &dyn Fn() -> bool,
    ) -> ConsensusResult<BlockBody> {
        Ok(BlockBody {
            mini_blocks: self.state.lock().mini_blocks.clone(),
        })
    }

    fn create_block_header(
        &self,
        body: &BlockBody,
        round_index: i64,
        _have_time: &dyn Fn() -> bool,
    ) -> ConsensusResult<BlockHeader> {
        Ok(BlockHeader {
            nonce: 0,
            round: round_index,
            shard_id: ShardId(0),
            time_stamp: SposTime::from_millis(0),
            prev_hash: Hash::compute_from(&[]),
            body_hash: body.compute_hash()?,
            prev_rand_seed: Vec::new(),
            rand_seed: Vec::new(),
            mini_block_headers: body.mini_block_headers()?,
            pub_keys_bitmap: Vec::new(),
            signature: Vec::new(),
        })
    }

    fn process_block(
        &self,
        _chain: &Blockchain,
        header: &BlockHeader,
        body: &BlockBody,
        have_time: &dyn Fn() -> bool,
    ) -> ConsensusResult<()> {
        if !have_time() {
            return Err(ConsensusError::ProcessorError(
                "no time left to process the block".into(),
            ));
        }
        if body.compute_hash()? != header.body_hash {
            return Err(ConsensusError::ProcessorError(
                "body does not match the header".into(),
            ));
        }
        self.state.lock().processed.push(header.clone());
        Ok(())
    }

    fn commit_block(
        &self,
        chain: &Blockchain,
        header: &BlockHeader,
        _body: &BlockBody,
    ) -> ConsensusResult<()> {
        let mut state = self.state.lock();
        if state.fail_commits {
            return Err(ConsensusError::CommitFailure("commits disabled".into()));
        }
        if header.nonce != chain.next_nonce() {
            return Err(ConsensusError::CommitFailure(format!(
                "expected nonce {}, got {}",
                chain.next_nonce(),
                header.nonce
            )));
        }
        state.committed.push(header.clone());
        Ok(())
    }

    fn revert_account_state(&self) {
        self.state.lock().reverts += 1;
    }

    fn marshalized_data_to_broadcast(
        &self,
        _header: &BlockHeader,
        body: &BlockBody,
    ) -> ConsensusResult<CrossShardData> {
        let serializer = MiniBlockSerializer::new();
        let mut data = CrossShardData::default();
        for mini_block in &body.mini_blocks {
            let buffer = data
                .mini_blocks
                .entry(mini_block.receiver_shard)
                .or_default();
            serializer
                .serialize(mini_block, buffer)
                .map_err(|err| ConsensusError::ProcessorError(err.to_string()))?;
            data.transactions
                .entry(mini_block.receiver_shard)
                .or_default()
                .extend(mini_block.tx_hashes.iter().map(|hash| hash.to_bytes().to_vec()));
        }
        Ok(data)
    }
}
