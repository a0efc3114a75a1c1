// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_models::message::{ConsensusMessage, MessageType};
use spos_models::subround::SubroundId;
use spos_signature::Bitmap;
use tracing::info;

/// The leader selects the members whose commitment hash arrived in time
pub(crate) fn job(ctx: &ConsensusContext) -> ConsensusResult<bool> {
    let (bitmap, data) = {
        let mut state = ctx.state.write();
        if !state.is_leader_in_current_round() {
            return Ok(true);
        }
        let data = state
            .data()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ConsensusError::HookFailure("no block under agreement".into()))?;
        let bitmap = state.generate_bitmap(SubroundId::COMMITMENT_HASH);
        let selected: Vec<usize> = bitmap.selected(state.consensus_group().len()).collect();
        if selected.len() < state.threshold(SubroundId::BITMAP) {
            return Err(ConsensusError::InvalidBitmap(format!(
                "only {} commitment hashes received",
                selected.len()
            )));
        }
        for index in selected {
            let key = state.consensus_group()[index];
            state.set_job_done(&key, SubroundId::BITMAP, true)?;
        }
        state.set_bitmap(bitmap.clone());
        (bitmap, data)
    };
    ctx.send_message(MessageType::Bitmap, data, bitmap.as_bytes().to_vec())?;
    info!(
        "{} bitmap sent with {} members",
        ctx.log_tag(),
        bitmap.count_ones()
    );
    Ok(true)
}

pub(crate) fn check(ctx: &ConsensusContext) -> bool {
    let state = ctx.state.read();
    let Some(bitmap) = state.bitmap() else {
        return false;
    };
    if let Some(index) = state.self_index() {
        if !bitmap.is_set(index) {
            info!(
                "[round {}] this node was left out of the bitmap",
                state.round_index()
            );
        }
    }
    true
}

/// Adopts the bitmap sent by the leader
pub(crate) fn received(ctx: &ConsensusContext, msg: &ConsensusMessage) -> ConsensusResult<()> {
    let mut state = ctx.state.write();
    ConsensusContext::check_message_round(&state, msg)?;
    if state.leader() != Some(&msg.pub_key) {
        return Err(ConsensusError::InvalidEnvelope(format!(
            "bitmap sent by {} who does not lead the round",
            msg.pub_key
        )));
    }
    ConsensusContext::check_block_fingerprint(&state, msg)?;
    if state.bitmap().is_some() {
        return Err(ConsensusError::DuplicateContribution(
            "bitmap already received".into(),
        ));
    }
    let bitmap = Bitmap::from_bytes(msg.payload.clone());
    let group_size = state.consensus_group().len();
    if group_size > bitmap.capacity() {
        return Err(ConsensusError::InvalidBitmap(format!(
            "{} bits for a group of {}",
            bitmap.capacity(),
            group_size
        )));
    }
    let selected: Vec<usize> = bitmap.selected(group_size).collect();
    if selected.len() < state.threshold(SubroundId::BITMAP) {
        return Err(ConsensusError::InvalidBitmap(format!(
            "{} members selected, {} needed",
            selected.len(),
            state.threshold(SubroundId::BITMAP)
        )));
    }
    for index in selected {
        let key = state.consensus_group()[index];
        state.set_job_done(&key, SubroundId::BITMAP, true)?;
    }
    state.set_bitmap(bitmap);
    Ok(())
}
