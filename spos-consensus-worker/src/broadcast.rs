// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Publication of committed blocks on the shard topics

use parking_lot::Mutex;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_consensus_exports::{CrossShardData, Messenger};
use spos_models::block::{BlockBody, BlockBodySerializer, BlockHeader, BlockHeaderSerializer, ShardId};
use spos_serialization::{Serializer, U64VarIntSerializer, VecU8Serializer};
use std::sync::Arc;
use tracing::debug;

/// Topic carrying the consensus messages of `shard`
pub(crate) fn consensus_topic(shard: ShardId) -> String {
    format!("consensus_{}", shard)
}

/// Topic carrying the committed headers of `shard`
pub(crate) fn headers_topic(shard: ShardId) -> String {
    format!("headers_{}", shard)
}

/// Topic carrying the committed bodies of `shard`
pub(crate) fn block_bodies_topic(shard: ShardId) -> String {
    format!("txBlockBodies_{}", shard)
}

/// Topic carrying the mini-blocks sent by `sender` to `receiver`
pub(crate) fn cross_shard_block_bodies_topic(sender: ShardId, receiver: ShardId) -> String {
    format!("txBlockBodies_{}_{}", sender, receiver)
}

/// Topic carrying the transactions sent by `sender` to `receiver`
pub(crate) fn cross_shard_transactions_topic(sender: ShardId, receiver: ShardId) -> String {
    format!("transactions_{}_{}", sender, receiver)
}

/// Serializes a list of transactions as one payload: count, then each length-prefixed item
pub(crate) fn pack_transactions(transactions: &[Vec<u8>]) -> ConsensusResult<Vec<u8>> {
    let count_serializer = U64VarIntSerializer::new();
    let item_serializer = VecU8Serializer::new();
    let mut buffer = Vec::new();
    count_serializer
        .serialize(&(transactions.len() as u64), &mut buffer)
        .map_err(|err| ConsensusError::MessengerError(err.to_string()))?;
    for transaction in transactions {
        item_serializer
            .serialize(transaction, &mut buffer)
            .map_err(|err| ConsensusError::MessengerError(err.to_string()))?;
    }
    Ok(buffer)
}

/// Publishes committed blocks. Publications of two blocks never interleave.
pub(crate) struct Broadcaster {
    messenger: Arc<dyn Messenger>,
    shard_id: ShardId,
    header_serializer: BlockHeaderSerializer,
    body_serializer: BlockBodySerializer,
    lock: Mutex<()>,
}

impl Broadcaster {
    pub(crate) fn new(messenger: Arc<dyn Messenger>, shard_id: ShardId) -> Self {
        Broadcaster {
            messenger,
            shard_id,
            header_serializer: BlockHeaderSerializer::new(),
            body_serializer: BlockBodySerializer::new(),
            lock: Mutex::new(()),
        }
    }

    /// Publishes the sealed header and the body of a committed block on the shard topics
    pub(crate) fn broadcast_block(
        &self,
        header: &BlockHeader,
        body: &BlockBody,
    ) -> ConsensusResult<()> {
        let mut header_bytes = Vec::new();
        self.header_serializer
            .serialize(header, &mut header_bytes)
            .map_err(|err| ConsensusError::MessengerError(err.to_string()))?;
        let mut body_bytes = Vec::new();
        self.body_serializer
            .serialize(body, &mut body_bytes)
            .map_err(|err| ConsensusError::MessengerError(err.to_string()))?;

        let _guard = self.lock.lock();
        self.messenger
            .broadcast(&headers_topic(self.shard_id), header_bytes)?;
        self.messenger
            .broadcast(&block_bodies_topic(self.shard_id), body_bytes)?;
        Ok(())
    }

    /// Publishes the cross-shard artifacts of a committed block. Entries addressed to the
    /// local shard are skipped. Returns the number of publications.
    pub(crate) fn broadcast_cross_shard(&self, data: CrossShardData) -> ConsensusResult<usize> {
        let _guard = self.lock.lock();
        let mut published = 0;
        for (receiver, bytes) in data.mini_blocks {
            if receiver == self.shard_id {
                continue;
            }
            self.messenger.broadcast(
                &cross_shard_block_bodies_topic(self.shard_id, receiver),
                bytes,
            )?;
            published += 1;
        }
        for (receiver, transactions) in data.transactions {
            if receiver == self.shard_id || transactions.is_empty() {
                continue;
            }
            self.messenger.broadcast(
                &cross_shard_transactions_topic(self.shard_id, receiver),
                pack_transactions(&transactions)?,
            )?;
            published += 1;
        }
        debug!("{} cross-shard publications", published);
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::{always, eq};
    use spos_consensus_exports::MockMessenger;
    use std::collections::BTreeMap;

    #[test]
    fn test_topics() {
        assert_eq!(consensus_topic(ShardId(2)), "consensus_2");
        assert_eq!(headers_topic(ShardId(0)), "headers_0");
        assert_eq!(block_bodies_topic(ShardId(1)), "txBlockBodies_1");
        assert_eq!(
            cross_shard_block_bodies_topic(ShardId(0), ShardId(3)),
            "txBlockBodies_0_3"
        );
        assert_eq!(
            cross_shard_transactions_topic(ShardId(1), ShardId(0)),
            "transactions_1_0"
        );
    }

    #[test]
    fn test_cross_shard_skips_local_shard() {
        let mut messenger = MockMessenger::new();
        messenger
            .expect_broadcast()
            .with(eq("txBlockBodies_1_2"), eq(vec![7u8]))
            .times(1)
            .returning(|_, _| Ok(()));
        messenger
            .expect_broadcast()
            .with(eq("transactions_1_0"), always())
            .times(1)
            .returning(|_, _| Ok(()));
        let broadcaster = Broadcaster::new(Arc::new(messenger), ShardId(1));

        let mut data = CrossShardData::default();
        data.mini_blocks.insert(ShardId(1), vec![1]);
        data.mini_blocks.insert(ShardId(2), vec![7]);
        let mut transactions = BTreeMap::new();
        transactions.insert(ShardId(0), vec![vec![1, 2], vec![3]]);
        transactions.insert(ShardId(1), vec![vec![9]]);
        data.transactions = transactions;

        assert_eq!(broadcaster.broadcast_cross_shard(data).unwrap(), 2);
    }

    #[test]
    fn test_pack_transactions_layout() {
        let packed = pack_transactions(&[vec![1, 2], vec![3]]).unwrap();
        assert_eq!(packed, vec![2, 2, 1, 2, 1, 3]);
    }
}
