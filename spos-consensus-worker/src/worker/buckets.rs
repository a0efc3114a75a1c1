// Copyright (c) 2022 MASSA LABS <info@massa.net>

use spos_models::message::{ConsensusMessage, MessageType};
use spos_signature::PublicKey;
use std::collections::{BTreeMap, HashSet};

/// Consensus messages of the current and next round.
///
/// A message is registered once per `(round, sender, type)`. Until its preconditions hold it
/// waits in the bucket of its type. Buckets are handed back in protocol order, so a proposal is
/// always tried before the contributions about it.
#[derive(Default)]
pub(crate) struct MessageBuckets {
    seen: HashSet<(i64, PublicKey, MessageType)>,
    pending: BTreeMap<u32, Vec<ConsensusMessage>>,
}

impl MessageBuckets {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Drops everything older than `round_index`
    pub(crate) fn start_round(&mut self, round_index: i64) {
        self.seen.retain(|(round, _, _)| *round >= round_index);
        for bucket in self.pending.values_mut() {
            bucket.retain(|msg| msg.round_index >= round_index);
        }
    }

    /// Returns false if the sender already sent a message of this type in this round
    pub(crate) fn register(&mut self, msg: &ConsensusMessage) -> bool {
        self.seen
            .insert((msg.round_index, msg.pub_key, msg.msg_type))
    }

    pub(crate) fn push_pending(&mut self, msg: ConsensusMessage) {
        self.pending
            .entry(u32::from(msg.msg_type))
            .or_default()
            .push(msg);
    }

    /// Empties every bucket, in protocol order
    pub(crate) fn take_pending(&mut self) -> Vec<ConsensusMessage> {
        std::mem::take(&mut self.pending)
            .into_values()
            .flatten()
            .collect()
    }

    /// Puts back messages whose preconditions still do not hold, ahead of newer arrivals
    pub(crate) fn requeue(&mut self, msgs: Vec<ConsensusMessage>) {
        let mut requeued: BTreeMap<u32, Vec<ConsensusMessage>> = BTreeMap::new();
        for msg in msgs {
            requeued
                .entry(u32::from(msg.msg_type))
                .or_default()
                .push(msg);
        }
        for (msg_type, mut bucket) in requeued {
            let newer = self.pending.remove(&msg_type).unwrap_or_default();
            bucket.extend(newer);
            self.pending.insert(msg_type, bucket);
        }
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }
}
