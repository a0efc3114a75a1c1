// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! DEFAULT VALUES USED TO INITIALIZE THE CONSENSUS CONFIGURATION
//!
//! Changing one of the following values is considered as a breaking change.

use crate::subround::SubroundId;

/// Size of the bounded channels between workers
pub const CHANNEL_SIZE: usize = 1024;
/// Capacity of the state-changed notifier: redundant pulses coalesce
pub const NOTIFIER_CAPACITY: usize = 1;
/// Maximum number of validators in a consensus group
pub const MAX_CONSENSUS_GROUP_SIZE: u32 = 400;
/// Maximum size of a serialized consensus message
pub const MAX_MESSAGE_SIZE: u32 = 10_485_760;
/// Maximum size of a consensus message payload
pub const MAX_MESSAGE_PAYLOAD_SIZE_BYTES: u64 = MAX_MESSAGE_SIZE as u64 - 256;
/// Highest message type id accepted on the wire
pub const MAX_MESSAGE_TYPE_ID: u32 = 6;
/// Maximum number of mini-blocks in a block body
pub const MAX_MINI_BLOCKS_PER_BLOCK: u32 = 1024;
/// Maximum number of transactions in a mini-block
pub const MAX_TRANSACTIONS_PER_MINI_BLOCK: u32 = 16_384;
/// Maximum size of a random seed
pub const MAX_RAND_SEED_SIZE_BYTES: u64 = 128;
/// Maximum size of the participation bitmap of a header
pub const MAX_BITMAP_SIZE_BYTES: u64 = (MAX_CONSENSUS_GROUP_SIZE as u64 + 7) / 8;
/// Maximum size of an aggregated signature (one ed25519 signature per signer at worst)
pub const MAX_SIGNATURE_SIZE_BYTES: u64 = MAX_CONSENSUS_GROUP_SIZE as u64 * 64;
/// Random seed of the genesis block
pub const GENESIS_RAND_SEED: &[u8] = b"spos genesis random seed";
/// Sleep between two iterations of the chronology loop, in milliseconds
pub const CHRONOLOGY_QUANTUM_MILLIS: u64 = 5;
/// Share of the round after which block processing must yield, in percent
pub const PROCESSING_THRESHOLD_PERCENT: u8 = 85;
/// Period of the NTP offset refresh, in milliseconds
pub const NTP_REFRESH_PERIOD_MILLIS: u64 = 3_600_000;
/// Timeout of a single NTP query, in milliseconds
pub const NTP_QUERY_TIMEOUT_MILLIS: u64 = 2_000;

/// Placement of a subround inside a round, as percentages of the round duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubroundTiming {
    /// subround id
    pub id: SubroundId,
    /// start offset, percent of the round duration
    pub start_percent: u8,
    /// end offset, percent of the round duration
    pub end_percent: u8,
}

const fn timing(id: SubroundId, start_percent: u8, end_percent: u8) -> SubroundTiming {
    SubroundTiming {
        id,
        start_percent,
        end_percent,
    }
}

/// Single aggregation schedule: Block, Signature, EndRound
pub const BLS_SCHEDULE: [SubroundTiming; 4] = [
    timing(SubroundId::START_ROUND, 0, 5),
    timing(SubroundId::BLOCK, 5, 25),
    timing(SubroundId::SIGNATURE, 25, 65),
    timing(SubroundId::END_ROUND, 65, 75),
];

/// Bellare–Neven schedule with the three commitment phases
pub const BN_SCHEDULE: [SubroundTiming; 7] = [
    timing(SubroundId::START_ROUND, 0, 5),
    timing(SubroundId::BLOCK, 5, 25),
    timing(SubroundId::COMMITMENT_HASH, 25, 40),
    timing(SubroundId::BITMAP, 40, 55),
    timing(SubroundId::COMMITMENT, 55, 70),
    timing(SubroundId::SIGNATURE, 70, 85),
    timing(SubroundId::END_ROUND, 85, 95),
];
