// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use crate::state::ConsensusState;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_consensus_exports::ConsensusVariant;
use spos_models::message::{ConsensusMessage, MessageType};
use spos_models::subround::SubroundId;
use spos_signature::Bitmap;
use tracing::debug;

/// Members whose shares make the aggregate: the leader's bitmap with Bellare–Neven, the whole
/// group otherwise
pub(crate) fn signing_bitmap(state: &ConsensusState, variant: ConsensusVariant) -> Option<Bitmap> {
    match variant {
        ConsensusVariant::BellareNeven => state.bitmap().cloned(),
        ConsensusVariant::Bls => {
            let size = state.consensus_group().len();
            let mut bitmap = Bitmap::new(size);
            (0..size).for_each(|index| {
                bitmap.set(index);
            });
            Some(bitmap)
        }
    }
}

/// Signs the block under agreement
pub(crate) fn job(ctx: &ConsensusContext) -> ConsensusResult<bool> {
    let (bitmap, data) = {
        let state = ctx.state.read();
        let Some(index) = state.self_index() else {
            return Ok(true);
        };
        let data = state
            .data()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ConsensusError::HookFailure("no block under agreement".into()))?;
        let bitmap = signing_bitmap(&state, ctx.cfg.variant)
            .ok_or_else(|| ConsensusError::HookFailure("no bitmap for this round".into()))?;
        if !bitmap.is_set(index) {
            return Ok(true);
        }
        (bitmap, data)
    };
    let share = ctx.multi_signer.lock().create_signature_share(&bitmap)?;
    let own = ctx.pub_key;
    ctx.state
        .write()
        .set_job_done(&own, SubroundId::SIGNATURE, true)?;
    ctx.send_message(MessageType::Signature, data, share)?;
    debug!("{} signature share sent", ctx.log_tag());
    Ok(true)
}

/// With Bellare–Neven every member of the bitmap must sign; otherwise the threshold is enough
pub(crate) fn check(ctx: &ConsensusContext) -> bool {
    let state = ctx.state.read();
    match ctx.cfg.variant {
        ConsensusVariant::BellareNeven => match state.bitmap() {
            Some(bitmap) => state.all_selected_done(bitmap, SubroundId::SIGNATURE),
            None => false,
        },
        ConsensusVariant::Bls => state.compute_threshold_reached(SubroundId::SIGNATURE),
    }
}

/// Verifies and stores a signature share
pub(crate) fn received(ctx: &ConsensusContext, msg: &ConsensusMessage) -> ConsensusResult<()> {
    let mut state = ctx.state.write();
    ConsensusContext::check_message_round(&state, msg)?;
    ConsensusContext::check_block_fingerprint(&state, msg)?;
    let index = state
        .index_of(&msg.pub_key)
        .ok_or_else(|| ConsensusError::InvalidEnvelope("sender not in group".into()))?;
    let bitmap = signing_bitmap(&state, ctx.cfg.variant)
        .ok_or_else(|| ConsensusError::PreconditionUnmet("no bitmap yet".into()))?;
    if !bitmap.is_set(index) {
        return Err(ConsensusError::InvalidBitmap(format!(
            "signature from {} who is not in the bitmap",
            msg.pub_key
        )));
    }
    {
        let mut signer = ctx.multi_signer.lock();
        signer.verify_signature_share(index, &msg.payload, &bitmap)?;
        signer.store_signature_share(index, &msg.payload)?;
    }
    state.set_job_done(&msg.pub_key, SubroundId::SIGNATURE, true)
}
