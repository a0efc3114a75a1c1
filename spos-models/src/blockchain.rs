// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::block::{BlockHeader, ShardId};
use crate::error::ModelsResult;
use spos_hash::Hash;
use spos_time::SposTime;

/// Tip of the local chain as seen by consensus
#[derive(Debug, Clone)]
pub struct Blockchain {
    genesis_header: BlockHeader,
    genesis_hash: Hash,
    current: Option<(BlockHeader, Hash)>,
}

impl Blockchain {
    /// Chain holding only the genesis block of `shard_id`
    pub fn new(shard_id: ShardId, genesis_time: SposTime, genesis_seed: Vec<u8>) -> ModelsResult<Self> {
        let genesis_header = BlockHeader {
            nonce: 0,
            round: 0,
            shard_id,
            time_stamp: genesis_time,
            prev_hash: Hash::compute_from(&[]),
            body_hash: Hash::compute_from(&[]),
            prev_rand_seed: genesis_seed.clone(),
            rand_seed: genesis_seed,
            mini_block_headers: Vec::new(),
            pub_keys_bitmap: Vec::new(),
            signature: Vec::new(),
        };
        let genesis_hash = genesis_header.compute_hash()?;
        Ok(Blockchain {
            genesis_header,
            genesis_hash,
            current: None,
        })
    }

    /// Genesis header
    pub fn genesis_header(&self) -> &BlockHeader {
        &self.genesis_header
    }

    /// Last committed header, genesis if nothing was committed
    pub fn last_header(&self) -> &BlockHeader {
        self.current
            .as_ref()
            .map(|(header, _)| header)
            .unwrap_or(&self.genesis_header)
    }

    /// Fingerprint of `last_header`
    pub fn last_header_hash(&self) -> Hash {
        self.current
            .as_ref()
            .map(|(_, hash)| *hash)
            .unwrap_or(self.genesis_hash)
    }

    /// Last committed header, `None` while only genesis is known
    pub fn current_header(&self) -> Option<&BlockHeader> {
        self.current.as_ref().map(|(header, _)| header)
    }

    /// Random seed used to pick the next consensus group
    pub fn rand_seed(&self) -> &[u8] {
        &self.last_header().rand_seed
    }

    /// Nonce of the next block
    pub fn next_nonce(&self) -> u64 {
        self.last_header().nonce.saturating_add(1)
    }

    /// Moves the tip to a freshly committed header
    pub fn advance(&mut self, header: BlockHeader) -> ModelsResult<()> {
        let hash = header.compute_hash()?;
        self.current = Some((header, hash));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tip_follows_commits() {
        let mut chain =
            Blockchain::new(ShardId(1), SposTime::from_millis(0), b"genesis".to_vec()).unwrap();
        assert_eq!(chain.next_nonce(), 1);
        assert_eq!(chain.rand_seed(), b"genesis");
        assert!(chain.current_header().is_none());
        let genesis_hash = chain.last_header_hash();

        let mut header = chain.genesis_header().clone();
        header.nonce = 1;
        header.round = 5;
        header.prev_hash = genesis_hash;
        header.rand_seed = b"next".to_vec();
        chain.advance(header.clone()).unwrap();

        assert_eq!(chain.next_nonce(), 2);
        assert_eq!(chain.rand_seed(), b"next");
        assert_eq!(chain.last_header_hash(), header.compute_hash().unwrap());
        assert_ne!(chain.last_header_hash(), genesis_hash);
    }
}
