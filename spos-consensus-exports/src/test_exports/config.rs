// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::{ConsensusConfig, ConsensusVariant};
use spos_models::block::ShardId;
use spos_models::config::{
    CHANNEL_SIZE, GENESIS_RAND_SEED, MAX_CONSENSUS_GROUP_SIZE, MAX_MESSAGE_PAYLOAD_SIZE_BYTES,
    NOTIFIER_CAPACITY,
};
use spos_time::SposTime;

/// Small rounds and a group of four, genesis at the next round boundary of a 1s grid
impl Default for ConsensusConfig {
    fn default() -> Self {
        let now = SposTime::now().to_millis();
        ConsensusConfig {
            genesis_timestamp: SposTime::from_millis(now - now % 1000 + 1000),
            round_duration: SposTime::from_millis(2000),
            variant: ConsensusVariant::Bls,
            sync_mode: false,
            shard_id: ShardId(0),
            consensus_group_size: 4,
            chronology_quantum: SposTime::from_millis(5),
            processing_threshold_percent: 85,
            ntp_hosts: Vec::new(),
            ntp_refresh_period: SposTime::from_millis(60_000),
            ntp_query_timeout: SposTime::from_millis(500),
            channel_size: CHANNEL_SIZE,
            notifier_capacity: NOTIFIER_CAPACITY,
            max_message_payload_size: MAX_MESSAGE_PAYLOAD_SIZE_BYTES,
            max_consensus_group_size: MAX_CONSENSUS_GROUP_SIZE as usize,
            genesis_rand_seed: GENESIS_RAND_SEED.to_vec(),
        }
    }
}
