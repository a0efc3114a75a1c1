// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_hash::Hash;
use spos_models::message::{ConsensusMessage, MessageType};
use spos_models::subround::SubroundId;
use tracing::debug;

/// Creates the commitment of this node and announces its hash
pub(crate) fn job(ctx: &ConsensusContext) -> ConsensusResult<bool> {
    let (self_index, data) = {
        let state = ctx.state.read();
        let Some(index) = state.self_index() else {
            return Ok(true);
        };
        let data = state
            .data()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ConsensusError::HookFailure("no block under agreement".into()))?;
        (index, data)
    };

    let hash = {
        let mut signer = ctx.multi_signer.lock();
        let (_, commitment) = signer.create_commitment()?;
        let hash = Hash::compute_from(&commitment);
        signer.store_commitment_hash(self_index, hash)?;
        hash
    };
    let own = ctx.pub_key;
    ctx.state
        .write()
        .set_job_done(&own, SubroundId::COMMITMENT_HASH, true)?;
    ctx.send_message(MessageType::CommitmentHash, data, hash.to_bytes().to_vec())?;
    debug!("{} commitment hash sent", ctx.log_tag());
    Ok(true)
}

pub(crate) fn check(ctx: &ConsensusContext) -> bool {
    ctx.state
        .read()
        .compute_threshold_reached(SubroundId::COMMITMENT_HASH)
}

pub(crate) fn received(ctx: &ConsensusContext, msg: &ConsensusMessage) -> ConsensusResult<()> {
    let hash = Hash::from_slice(&msg.payload)
        .map_err(|err| ConsensusError::InvalidEnvelope(err.to_string()))?;
    let mut state = ctx.state.write();
    ConsensusContext::check_message_round(&state, msg)?;
    ConsensusContext::check_block_fingerprint(&state, msg)?;
    let index = state
        .index_of(&msg.pub_key)
        .ok_or_else(|| ConsensusError::InvalidEnvelope("sender not in group".into()))?;
    ctx.multi_signer.lock().store_commitment_hash(index, hash)?;
    state.set_job_done(&msg.pub_key, SubroundId::COMMITMENT_HASH, true)
}
