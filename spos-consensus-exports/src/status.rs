// Copyright (c) 2022 MASSA LABS <info@massa.net>

use serde::{Deserialize, Serialize};
use spos_models::subround::{SubroundId, SubroundStatus};
use spos_signature::PublicKey;
use spos_time::SposTime;

/// Snapshot of the consensus of the current round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusStatus {
    /// current round index
    pub round_index: i64,
    /// start of the current round
    pub round_time_stamp: SposTime,
    /// last subround the node is working on
    pub self_subround: SubroundId,
    /// subround the wall clock falls into
    pub time_subround: SubroundId,
    /// status of every subround of the schedule
    pub subround_statuses: Vec<(SubroundId, SubroundStatus)>,
    /// leader of the round, once the group is known
    pub leader: Option<PublicKey>,
    /// whether this node is in the consensus group
    pub in_consensus_group: bool,
    /// whether the round was canceled
    pub round_canceled: bool,
    /// error that canceled the round, if any
    pub round_failure: Option<String>,
    /// number of blocks committed since start
    pub committed_blocks: u64,
}
