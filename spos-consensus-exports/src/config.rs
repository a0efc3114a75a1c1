// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::{ConsensusError, ConsensusResult};
use crate::settings::{ConsensusSettings, ConsensusVariant};
use spos_models::block::ShardId;
use spos_models::config::{
    SubroundTiming, BLS_SCHEDULE, BN_SCHEDULE, CHANNEL_SIZE, GENESIS_RAND_SEED,
    MAX_CONSENSUS_GROUP_SIZE, MAX_MESSAGE_PAYLOAD_SIZE_BYTES, NOTIFIER_CAPACITY,
    NTP_QUERY_TIMEOUT_MILLIS,
};
use spos_time::SposTime;

/// Consensus configuration: user settings merged with the protocol constants
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// start of round 0
    pub genesis_timestamp: SposTime,
    /// round duration
    pub round_duration: SposTime,
    /// signature scheme and schedule
    pub variant: ConsensusVariant,
    /// pace subrounds on the wall clock
    pub sync_mode: bool,
    /// shard of the node
    pub shard_id: ShardId,
    /// number of validators drawn for each round
    pub consensus_group_size: usize,
    /// sleep between two chronology iterations
    pub chronology_quantum: SposTime,
    /// share of the round after which block processing must stop, in percent
    pub processing_threshold_percent: u8,
    /// NTP servers
    pub ntp_hosts: Vec<String>,
    /// period of the clock offset refresh
    pub ntp_refresh_period: SposTime,
    /// timeout of a single NTP query
    pub ntp_query_timeout: SposTime,
    /// capacity of the inbound message queue
    pub channel_size: usize,
    /// capacity of the state-changed notifier
    pub notifier_capacity: usize,
    /// largest accepted message payload
    pub max_message_payload_size: u64,
    /// largest accepted consensus group
    pub max_consensus_group_size: usize,
    /// random seed of the genesis block
    pub genesis_rand_seed: Vec<u8>,
}

impl ConsensusConfig {
    /// Subround schedule of the configured variant
    pub fn schedule(&self) -> &'static [SubroundTiming] {
        match self.variant {
            ConsensusVariant::BellareNeven => &BN_SCHEDULE,
            ConsensusVariant::Bls => &BLS_SCHEDULE,
        }
    }

    /// Offset inside the round matching `percent` of the round duration
    pub fn round_offset(&self, percent: u8) -> SposTime {
        SposTime::from_millis(
            self.round_duration
                .to_millis()
                .saturating_mul(u64::from(percent))
                / 100,
        )
    }

    /// Checks the values a node cannot run with
    pub fn validate(&self) -> ConsensusResult<()> {
        if self.round_duration.to_millis() == 0 {
            return Err(ConsensusError::ConfigError(
                "round duration must be positive".into(),
            ));
        }
        if self.consensus_group_size == 0
            || self.consensus_group_size > self.max_consensus_group_size
        {
            return Err(ConsensusError::ConfigError(format!(
                "consensus group size must be in [1, {}], got {}",
                self.max_consensus_group_size, self.consensus_group_size
            )));
        }
        if self.processing_threshold_percent > 100 {
            return Err(ConsensusError::ConfigError(format!(
                "processing threshold is a percentage, got {}",
                self.processing_threshold_percent
            )));
        }
        Ok(())
    }
}

impl From<ConsensusSettings> for ConsensusConfig {
    fn from(settings: ConsensusSettings) -> Self {
        ConsensusConfig {
            genesis_timestamp: settings.genesis_timestamp,
            round_duration: settings.round_duration,
            variant: settings.variant,
            sync_mode: settings.sync_mode,
            shard_id: ShardId(settings.shard_id),
            consensus_group_size: settings.consensus_group_size,
            chronology_quantum: settings.chronology_quantum,
            processing_threshold_percent: settings.processing_threshold_percent,
            ntp_hosts: settings.ntp_hosts,
            ntp_refresh_period: settings.ntp_refresh_period,
            ntp_query_timeout: SposTime::from_millis(NTP_QUERY_TIMEOUT_MILLIS),
            channel_size: CHANNEL_SIZE,
            notifier_capacity: NOTIFIER_CAPACITY,
            max_message_payload_size: MAX_MESSAGE_PAYLOAD_SIZE_BYTES,
            max_consensus_group_size: MAX_CONSENSUS_GROUP_SIZE as usize,
            genesis_rand_seed: GENESIS_RAND_SEED.to_vec(),
        }
    }
}
