// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! State and collaborators shared by the chronology thread and the message worker thread.
//!
//! Lock order: `pending_guard`, `buckets`, `state`, `chain`, `multi_signer`. Locks are taken
//! for single updates and never held across a collaborator call that may block.

use crate::broadcast::Broadcaster;
use crate::phases;
use crate::state::ConsensusState;
use crate::worker::buckets::MessageBuckets;
use crossbeam::channel::TrySendError;
use parking_lot::{Mutex, RwLock};
use spos_channel::sender::SposSender;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_consensus_exports::{
    BlockProcessor, ConsensusChannels, ConsensusConfig, ConsensusStatus, ConsensusVariant,
    Messenger, ValidatorGroupSelector,
};
use spos_models::blockchain::Blockchain;
use spos_models::message::{encode_message, ConsensusMessage, MessageType};
use spos_models::round::Round;
use spos_models::subround::{SubroundId, SubroundStatus};
use spos_signature::{BelNevMultiSigner, Ed25519MultiSigner, KeyPair, MultiSigner, PublicKey};
use spos_time::SyncTimer;
use std::sync::Arc;
use tracing::{debug, warn};

/// Subrounds the chronology is working on, published for the controller
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChronologyView {
    pub self_subround: SubroundId,
    pub time_subround: SubroundId,
}

pub(crate) struct ConsensusContext {
    pub cfg: ConsensusConfig,
    pub keypair: KeyPair,
    pub pub_key: PublicKey,
    pub sync_timer: Arc<dyn SyncTimer>,
    pub messenger: Arc<dyn Messenger>,
    pub block_processor: Arc<dyn BlockProcessor>,
    pub group_selector: Arc<dyn ValidatorGroupSelector>,
    pub broadcaster: Broadcaster,
    pub consensus_topic: String,
    pub round: RwLock<Round>,
    pub state: RwLock<ConsensusState>,
    pub chain: RwLock<Blockchain>,
    pub multi_signer: Mutex<Box<dyn MultiSigner>>,
    pub buckets: Mutex<MessageBuckets>,
    pub chronology_view: RwLock<ChronologyView>,
    /// committed block count and round of the last commit
    pub commits: Mutex<(u64, Option<i64>)>,
    pending_guard: Mutex<()>,
    notifier: SposSender<()>,
}

impl ConsensusContext {
    pub(crate) fn new(
        cfg: ConsensusConfig,
        channels: ConsensusChannels,
        keypair: KeyPair,
        notifier: SposSender<()>,
    ) -> ConsensusResult<Self> {
        let pub_key = keypair.get_public_key();
        let multi_signer: Box<dyn MultiSigner> = match cfg.variant {
            ConsensusVariant::BellareNeven => Box::new(BelNevMultiSigner::new(&keypair)),
            ConsensusVariant::Bls => Box::new(Ed25519MultiSigner::new(&keypair)),
        };
        let chain = Blockchain::new(
            cfg.shard_id,
            cfg.genesis_timestamp,
            cfg.genesis_rand_seed.clone(),
        )?;
        let round = Round::new(
            cfg.genesis_timestamp,
            channels.sync_timer.current_time(),
            cfg.round_duration,
        );
        Ok(ConsensusContext {
            broadcaster: Broadcaster::new(channels.messenger.clone(), cfg.shard_id),
            consensus_topic: crate::broadcast::consensus_topic(cfg.shard_id),
            sync_timer: channels.sync_timer,
            messenger: channels.messenger,
            block_processor: channels.block_processor,
            group_selector: channels.group_selector,
            round: RwLock::new(round),
            state: RwLock::new(ConsensusState::new(pub_key)),
            chain: RwLock::new(chain),
            multi_signer: Mutex::new(multi_signer),
            buckets: Mutex::new(MessageBuckets::new()),
            chronology_view: RwLock::new(ChronologyView {
                self_subround: SubroundId::BEFORE_ROUND,
                time_subround: SubroundId::UNKNOWN,
            }),
            commits: Mutex::new((0, None)),
            pending_guard: Mutex::new(()),
            notifier,
            cfg,
            keypair,
            pub_key,
        })
    }

    pub(crate) fn current_round(&self) -> Round {
        *self.round.read()
    }

    /// False once the processing share of the current round is spent
    pub(crate) fn have_time(&self) -> bool {
        let round = self.current_round();
        let elapsed = round.time_in_round(self.sync_timer.current_time());
        let budget = round
            .time_duration()
            .to_millis()
            .saturating_mul(u64::from(self.cfg.processing_threshold_percent))
            / 100;
        elapsed < i64::try_from(budget).unwrap_or(i64::MAX)
    }

    /// Prefix of the log lines of subround hooks
    pub(crate) fn log_tag(&self) -> String {
        format!(
            "[{}] [round {}]",
            self.sync_timer.formatted_current_time(),
            self.state.read().round_index()
        )
    }

    /// Signs and publishes a message of the current round on the consensus topic
    pub(crate) fn send_message(
        &self,
        msg_type: MessageType,
        block_header_hash: Vec<u8>,
        payload: Vec<u8>,
    ) -> ConsensusResult<()> {
        let round_index = self.state.read().round_index();
        let msg = ConsensusMessage::new_signed(
            &self.keypair,
            msg_type,
            block_header_hash,
            payload,
            round_index,
            self.sync_timer.current_time(),
        )?;
        self.messenger
            .broadcast(&self.consensus_topic, encode_message(&msg)?)?;
        spos_trace!("consensus.message.sent", {
            "round": round_index,
            "type": format!("{:?}", msg_type),
        });
        Ok(())
    }

    /// Wakes up a subround waiting for its check. Pulses coalesce.
    pub(crate) fn pulse(&self) {
        match self.notifier.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                debug!("state-changed notifier disconnected");
            }
        }
    }

    /// Marks `subround` finished and retries the messages that were waiting for it
    pub(crate) fn finish_subround(&self, subround: SubroundId) {
        let changed = self
            .state
            .write()
            .set_status(subround, SubroundStatus::Finished);
        if changed {
            self.process_pending();
        }
    }

    /// Deadline of `subround` passed: the round can no longer produce a block
    pub(crate) fn extend_subround(&self, subround: SubroundId) {
        let err = ConsensusError::DeadlineExceeded(format!("subround {} extended", subround));
        {
            let mut state = self.state.write();
            state.set_status(subround, SubroundStatus::Extended);
            state.fail_round(err.to_string());
        }
        warn!("{} {}, round canceled", self.log_tag(), err);
    }

    pub(crate) fn cancel_round(&self) {
        self.state.write().cancel_round();
    }

    /// Cancels the round because of `err`
    pub(crate) fn fail_round(&self, err: &ConsensusError) {
        self.state.write().fail_round(err.to_string());
    }

    /// Entry point of a decoded message
    pub(crate) fn receive_message(&self, msg: ConsensusMessage) -> ConsensusResult<()> {
        if msg.pub_key == self.pub_key {
            return Err(ConsensusError::InvalidEnvelope(
                "message sent by this node".into(),
            ));
        }
        msg.verify_signature()
            .map_err(|err| ConsensusError::InvalidEnvelope(err.to_string()))?;
        // older rounds are over; at most one round ahead of this node is kept
        let state_round = self.state.read().round_index();
        let latest_round = state_round.max(self.current_round().index());
        if msg.round_index < state_round || msg.round_index > latest_round.saturating_add(1) {
            return Err(ConsensusError::InvalidEnvelope(format!(
                "message of round {} received in round {}",
                msg.round_index, state_round
            )));
        }
        {
            let mut buckets = self.buckets.lock();
            if !buckets.register(&msg) {
                return Err(ConsensusError::DuplicateContribution(format!(
                    "{:?} from {} in round {}",
                    msg.msg_type, msg.pub_key, msg.round_index
                )));
            }
            buckets.push_pending(msg);
        }
        self.process_pending();
        Ok(())
    }

    /// Applies every pending message whose preconditions now hold
    pub(crate) fn process_pending(&self) {
        let _guard = self.pending_guard.lock();
        let mut applied = 0usize;
        loop {
            let pending = self.buckets.lock().take_pending();
            if pending.is_empty() {
                break;
            }
            let mut waiting = Vec::new();
            let mut applied_now = 0usize;
            for msg in pending {
                match self.apply_message(&msg) {
                    Ok(()) => applied_now += 1,
                    Err(err) if err.is_precondition_unmet() => waiting.push(msg),
                    Err(err) => debug!(
                        "dropping {:?} of round {} from {}: {}",
                        msg.msg_type, msg.round_index, msg.pub_key, err
                    ),
                }
            }
            let mut buckets = self.buckets.lock();
            buckets.requeue(waiting);
            if applied_now == 0 {
                if buckets.pending_len() > 0 {
                    debug!("{} consensus messages waiting", buckets.pending_len());
                }
                break;
            }
            drop(buckets);
            applied += applied_now;
        }
        if applied > 0 {
            self.pulse();
        }
    }

    fn apply_message(&self, msg: &ConsensusMessage) -> ConsensusResult<()> {
        {
            let state = self.state.read();
            if msg.round_index > state.round_index() {
                return Err(ConsensusError::PreconditionUnmet(format!(
                    "round {} not started",
                    msg.round_index
                )));
            }
            if msg.round_index < state.round_index() {
                return Err(ConsensusError::InvalidEnvelope(format!(
                    "round {} is over",
                    msg.round_index
                )));
            }
            if state.round_canceled() {
                return Err(ConsensusError::InvalidEnvelope(format!(
                    "round {} canceled",
                    msg.round_index
                )));
            }
            if !state.is_in_consensus_group(&msg.pub_key) {
                return Err(ConsensusError::InvalidEnvelope(format!(
                    "{} is not in the consensus group",
                    msg.pub_key
                )));
            }
            if msg.msg_type == MessageType::Unknown {
                return Err(ConsensusError::InvalidEnvelope("unknown message type".into()));
            }
            if !state.can_proceed(msg.msg_type, self.cfg.variant) {
                if state.status(msg.msg_type.subround()) == SubroundStatus::Extended {
                    return Err(ConsensusError::InvalidEnvelope(format!(
                        "subround {} extended",
                        msg.msg_type.subround()
                    )));
                }
                return Err(ConsensusError::PreconditionUnmet(format!(
                    "{:?} received too early",
                    msg.msg_type
                )));
            }
        }
        match msg.msg_type {
            MessageType::BlockBody | MessageType::BlockHeader => {
                phases::block::received_block_part(self, msg)
            }
            MessageType::CommitmentHash => phases::commitment_hash::received(self, msg),
            MessageType::Bitmap => phases::bitmap::received(self, msg),
            MessageType::Commitment => phases::commitment::received(self, msg),
            MessageType::Signature => phases::signature::received(self, msg),
            MessageType::Unknown => Err(ConsensusError::InvalidEnvelope(
                "unknown message type".into(),
            )),
        }
    }

    /// Checks that `msg` belongs to the round the state was reset for. Handlers call it again
    /// under the write lock they update the state with.
    pub(crate) fn check_message_round(
        state: &ConsensusState,
        msg: &ConsensusMessage,
    ) -> ConsensusResult<()> {
        if msg.round_index != state.round_index() {
            return Err(ConsensusError::InvalidEnvelope(format!(
                "round {} is over",
                msg.round_index
            )));
        }
        Ok(())
    }

    /// Checks that `msg` is about the block under agreement
    pub(crate) fn check_block_fingerprint(
        state: &ConsensusState,
        msg: &ConsensusMessage,
    ) -> ConsensusResult<()> {
        match state.data() {
            Some(data) if data == msg.block_header_hash.as_slice() => Ok(()),
            Some(_) => Err(ConsensusError::InvalidEnvelope(format!(
                "{:?} from {} is about another block",
                msg.msg_type, msg.pub_key
            ))),
            None => Err(ConsensusError::PreconditionUnmet(
                "no block under agreement yet".into(),
            )),
        }
    }

    /// Snapshot for the controller
    pub(crate) fn status(&self) -> ConsensusStatus {
        let round = self.current_round();
        let view = *self.chronology_view.read();
        let committed_blocks = self.commits.lock().0;
        let state = self.state.read();
        ConsensusStatus {
            round_index: round.index(),
            round_time_stamp: round.time_stamp(),
            self_subround: view.self_subround,
            time_subround: view.time_subround,
            subround_statuses: self
                .cfg
                .schedule()
                .iter()
                .map(|timing| (timing.id, state.status(timing.id)))
                .collect(),
            leader: state.leader().copied(),
            in_consensus_group: state.is_in_consensus_group(&self.pub_key),
            round_canceled: state.round_canceled(),
            round_failure: state.failure().map(str::to_string),
            committed_blocks,
        }
    }
}
