// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use crate::phases::Phase;
use spos_channel::receiver::SposReceiver;
use spos_channel::SposChannel;
use spos_consensus_exports::error::ConsensusResult;
use spos_consensus_exports::test_exports::{LocalNetwork, MemoryBlockProcessor};
use spos_consensus_exports::{
    ConsensusChannels, ConsensusConfig, ConsensusVariant, MockValidatorGroupSelector,
};
use spos_models::message::{decode_message, ConsensusMessage, ConsensusMessageDeserializer};
use spos_signature::{KeyPair, PublicKey};
use spos_time::test_exports::ManualSyncTimer;
use spos_time::{SposTime, SyncTimer};
use std::sync::Arc;

pub const GENESIS_MILLIS: u64 = 1_000_000_000;
pub const CONSENSUS_TOPIC: &str = "consensus_0";

pub fn genesis() -> SposTime {
    SposTime::from_millis(GENESIS_MILLIS)
}

/// Configuration with a genesis far in the past of the frozen test clocks
pub fn test_config(variant: ConsensusVariant, group_size: usize) -> ConsensusConfig {
    ConsensusConfig {
        genesis_timestamp: genesis(),
        round_duration: SposTime::from_millis(2000),
        variant,
        consensus_group_size: group_size,
        ..Default::default()
    }
}

/// Selector always drawing `group`, in this order
pub fn fixed_group_selector(group: Vec<PublicKey>) -> MockValidatorGroupSelector {
    let mut selector = MockValidatorGroupSelector::new();
    selector
        .expect_compute_validators_group()
        .returning(move |_, _| Ok(group.clone()));
    selector
}

pub struct TestNode {
    pub ctx: Arc<ConsensusContext>,
    pub notifier: SposReceiver<()>,
    pub processor: MemoryBlockProcessor,
    pub keypair: KeyPair,
}

/// Validators sharing a frozen clock and a network nobody listens to.
///
/// Phases are driven by hand and messages are delivered with `deliver`, so every test decides
/// exactly what each node has seen. Node 0 leads every round.
pub struct TestCluster {
    pub nodes: Vec<TestNode>,
    pub network: LocalNetwork,
    pub timer: Arc<ManualSyncTimer>,
    pub cfg: ConsensusConfig,
    delivered: usize,
}

impl TestCluster {
    pub fn new(variant: ConsensusVariant, size: usize) -> Self {
        Self::with_config(test_config(variant, size))
    }

    pub fn with_config(cfg: ConsensusConfig) -> Self {
        let start = cfg.genesis_timestamp.saturating_add(SposTime::from_millis(10));
        Self::with_clock(cfg, start)
    }

    /// Cluster whose frozen clock reads `start`
    pub fn with_clock(cfg: ConsensusConfig, start: SposTime) -> Self {
        let size = cfg.consensus_group_size;
        let keypairs: Vec<KeyPair> = (0..size).map(|_| KeyPair::generate()).collect();
        let group: Vec<PublicKey> = keypairs.iter().map(KeyPair::get_public_key).collect();
        let network = LocalNetwork::new();
        let timer = Arc::new(ManualSyncTimer::frozen_at(start));
        let nodes = keypairs
            .into_iter()
            .enumerate()
            .map(|(node_id, keypair)| {
                let processor = MemoryBlockProcessor::new();
                let channels = ConsensusChannels {
                    messenger: Arc::new(network.messenger(node_id)),
                    block_processor: Arc::new(processor.clone()),
                    group_selector: Arc::new(fixed_group_selector(group.clone())),
                    sync_timer: timer.clone(),
                };
                let (notifier_tx, notifier) =
                    SposChannel::new(format!("test_notifier_{}", node_id), Some(1));
                let ctx = ConsensusContext::new(cfg.clone(), channels, keypair.clone(), notifier_tx)
                    .unwrap();
                TestNode {
                    ctx: Arc::new(ctx),
                    notifier,
                    processor,
                    keypair,
                }
            })
            .collect();
        TestCluster {
            nodes,
            network,
            timer,
            cfg,
            delivered: 0,
        }
    }

    pub fn ctx(&self, node: usize) -> &ConsensusContext {
        &self.nodes[node].ctx
    }

    pub fn timer_now(&self) -> SposTime {
        self.timer.current_time()
    }

    pub fn job(&self, node: usize, phase: Phase) -> ConsensusResult<bool> {
        phase.job(self.ctx(node))
    }

    pub fn check(&self, node: usize, phase: Phase) -> bool {
        phase.check(self.ctx(node))
    }

    /// Runs the job of `phase` on every node, delivers what was sent, then runs the checks
    pub fn run_phase(&mut self, phase: Phase) -> Vec<bool> {
        for node in 0..self.nodes.len() {
            assert!(
                self.job(node, phase).unwrap(),
                "job of {:?} failed on node {}",
                phase,
                node
            );
        }
        self.deliver();
        (0..self.nodes.len())
            .map(|node| self.check(node, phase))
            .collect()
    }

    /// Runs every phase of `phases`, asserting each of them completes on every node
    pub fn run_phases(&mut self, phases: &[Phase]) {
        for phase in phases {
            let checks = self.run_phase(*phase);
            assert!(
                checks.iter().all(|done| *done),
                "{:?} not done everywhere: {:?}",
                phase,
                checks
            );
        }
    }

    /// Every consensus message published so far, decoded, with its sender
    pub fn published(&self) -> Vec<(usize, ConsensusMessage)> {
        let deserializer = ConsensusMessageDeserializer::new(self.cfg.max_message_payload_size);
        self.network
            .published(CONSENSUS_TOPIC)
            .into_iter()
            .map(|(from, bytes)| (from, decode_message(&deserializer, &bytes).unwrap()))
            .collect()
    }

    /// Hands every message not delivered yet to all nodes except its sender
    pub fn deliver(&mut self) {
        let published = self.published();
        for (from, msg) in published.iter().skip(self.delivered) {
            for (node_id, node) in self.nodes.iter().enumerate() {
                if node_id != *from {
                    let _ = node.ctx.receive_message(msg.clone());
                }
            }
        }
        self.delivered = published.len();
    }
}

pub fn bls_phases() -> Vec<Phase> {
    vec![
        Phase::StartRound,
        Phase::Block,
        Phase::Signature,
        Phase::EndRound,
    ]
}

pub fn bn_phases() -> Vec<Phase> {
    vec![
        Phase::StartRound,
        Phase::Block,
        Phase::CommitmentHash,
        Phase::Bitmap,
        Phase::Commitment,
        Phase::Signature,
        Phase::EndRound,
    ]
}
