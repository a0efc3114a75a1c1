// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use crate::phases::signature::signing_bitmap;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_consensus_exports::ConsensusVariant;
use spos_models::subround::SubroundId;
use tracing::{info, warn};

/// Aggregates the shares, seals the header and commits the block
pub(crate) fn job(ctx: &ConsensusContext) -> ConsensusResult<bool> {
    let (round_index, bitmap, group_size, threshold, mut header, body, is_leader) = {
        let state = ctx.state.read();
        let bitmap = match ctx.cfg.variant {
            ConsensusVariant::BellareNeven => signing_bitmap(&state, ctx.cfg.variant)
                .ok_or_else(|| ConsensusError::HookFailure("no bitmap for this round".into()))?,
            ConsensusVariant::Bls => state.generate_bitmap(SubroundId::SIGNATURE),
        };
        let (Some(header), Some(body)) = (state.header().cloned(), state.body().cloned()) else {
            return Err(ConsensusError::HookFailure("no block under agreement".into()));
        };
        (
            state.round_index(),
            bitmap,
            state.consensus_group().len(),
            state.threshold(SubroundId::END_ROUND),
            header,
            body,
            state.is_leader_in_current_round(),
        )
    };
    if ctx.commits.lock().1 == Some(round_index) {
        return Ok(true);
    }

    let signers: Vec<usize> = bitmap.selected(group_size).collect();
    if signers.len() < threshold {
        return Err(ConsensusError::InvalidBitmap(format!(
            "{} signers, {} needed",
            signers.len(),
            threshold
        )));
    }
    let signature = {
        let mut signer = ctx.multi_signer.lock();
        for index in &signers {
            let share = signer.signature_share(*index)?;
            signer.verify_signature_share(*index, &share, &bitmap)?;
        }
        let aggregated = signer.aggregate_sigs(&bitmap)?;
        signer.verify(&aggregated, &bitmap)?;
        aggregated
    };
    header.pub_keys_bitmap = bitmap.as_bytes().to_vec();
    header.signature = signature;

    let chain = ctx.chain.read().clone();
    if let Err(err) = ctx.block_processor.commit_block(&chain, &header, &body) {
        warn!("{} commit failed: {}", ctx.log_tag(), err);
        ctx.block_processor.revert_account_state();
        return Err(ConsensusError::CommitFailure(err.to_string()));
    }
    ctx.chain.write().advance(header.clone())?;
    {
        let mut commits = ctx.commits.lock();
        commits.0 += 1;
        commits.1 = Some(round_index);
    }
    ctx.state.write().seal_header(header.clone());
    info!(
        "{} block committed with nonce {} and {} signers",
        ctx.log_tag(),
        header.nonce,
        signers.len()
    );
    spos_trace!("consensus.block.committed", {
        "round": round_index,
        "nonce": header.nonce,
        "signers": signers.len(),
    });

    if is_leader {
        if let Err(err) = ctx.broadcaster.broadcast_block(&header, &body) {
            warn!("{} could not broadcast the block: {}", ctx.log_tag(), err);
        }
        match ctx
            .block_processor
            .marshalized_data_to_broadcast(&header, &body)
            .and_then(|data| ctx.broadcaster.broadcast_cross_shard(data))
        {
            Ok(count) if count > 0 => {
                info!("{} {} cross-shard publications", ctx.log_tag(), count)
            }
            Ok(_) => {}
            Err(err) => warn!(
                "{} could not broadcast cross-shard data: {}",
                ctx.log_tag(),
                err
            ),
        }
    }
    Ok(true)
}

pub(crate) fn check(ctx: &ConsensusContext) -> bool {
    let round_index = ctx.state.read().round_index();
    ctx.commits.lock().1 == Some(round_index)
}
