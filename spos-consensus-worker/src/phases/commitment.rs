// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_hash::Hash;
use spos_models::message::{ConsensusMessage, MessageType};
use spos_models::subround::SubroundId;
use spos_signature::SposSignatureError;
use tracing::debug;

/// Members selected by the bitmap reveal their commitment
pub(crate) fn job(ctx: &ConsensusContext) -> ConsensusResult<bool> {
    let (self_index, data) = {
        let state = ctx.state.read();
        let Some(index) = state.self_index() else {
            return Ok(true);
        };
        let selected = state.bitmap().map(|b| b.is_set(index)).unwrap_or(false);
        if !selected {
            return Ok(true);
        }
        let data = state
            .data()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ConsensusError::HookFailure("no block under agreement".into()))?;
        (index, data)
    };
    let commitment = ctx.multi_signer.lock().commitment(self_index)?;
    let own = ctx.pub_key;
    ctx.state
        .write()
        .set_job_done(&own, SubroundId::COMMITMENT, true)?;
    ctx.send_message(MessageType::Commitment, data, commitment)?;
    debug!("{} commitment sent", ctx.log_tag());
    Ok(true)
}

/// Done once every member of the bitmap revealed a commitment
pub(crate) fn check(ctx: &ConsensusContext) -> bool {
    let state = ctx.state.read();
    match state.bitmap() {
        Some(bitmap) => state.all_selected_done(bitmap, SubroundId::COMMITMENT),
        None => false,
    }
}

/// Checks a revealed commitment against the hash its sender announced earlier
pub(crate) fn received(ctx: &ConsensusContext, msg: &ConsensusMessage) -> ConsensusResult<()> {
    let mut state = ctx.state.write();
    ConsensusContext::check_message_round(&state, msg)?;
    ConsensusContext::check_block_fingerprint(&state, msg)?;
    let index = state
        .index_of(&msg.pub_key)
        .ok_or_else(|| ConsensusError::InvalidEnvelope("sender not in group".into()))?;
    let selected = state.bitmap().map(|b| b.is_set(index)).unwrap_or(false);
    if !selected {
        return Err(ConsensusError::InvalidBitmap(format!(
            "commitment from {} who is not in the bitmap",
            msg.pub_key
        )));
    }
    {
        let mut signer = ctx.multi_signer.lock();
        let expected = match signer.commitment_hash(index) {
            Ok(hash) => hash,
            Err(SposSignatureError::MissingCommitment(_)) => {
                return Err(ConsensusError::PreconditionUnmet(format!(
                    "commitment hash of {} not received yet",
                    msg.pub_key
                )))
            }
            Err(err) => return Err(err.into()),
        };
        if Hash::compute_from(&msg.payload) != expected {
            return Err(ConsensusError::CommitmentHashDoesNotMatch(index));
        }
        signer.store_commitment(index, &msg.payload)?;
    }
    state.set_job_done(&msg.pub_key, SubroundId::COMMITMENT, true)
}
