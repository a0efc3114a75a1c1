// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use crate::state::signature_threshold;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_models::subround::SubroundId;
use tracing::info;

/// Draws the group of the round and resets the round state
pub(crate) fn job(ctx: &ConsensusContext) -> ConsensusResult<bool> {
    let round = ctx.current_round();
    let seed = ctx.chain.read().rand_seed().to_vec();
    let group = ctx
        .group_selector
        .compute_validators_group(&seed, round.index())?;
    if group.is_empty() || group.len() > ctx.cfg.max_consensus_group_size {
        return Err(ConsensusError::HookFailure(format!(
            "consensus group of size {} drawn for round {}",
            group.len(),
            round.index()
        )));
    }
    let threshold = signature_threshold(group.len());
    let self_index = group.iter().position(|key| *key == ctx.pub_key);

    ctx.buckets.lock().start_round(round.index());
    {
        let mut state = ctx.state.write();
        state.reset_for_round(round.index());
        state.set_consensus_group(group.clone());
        state.set_threshold(SubroundId::BLOCK, 1);
        for subround in [
            SubroundId::COMMITMENT_HASH,
            SubroundId::BITMAP,
            SubroundId::COMMITMENT,
            SubroundId::SIGNATURE,
            SubroundId::END_ROUND,
        ] {
            state.set_threshold(subround, threshold);
        }
    }

    let tag = ctx.log_tag();
    match self_index {
        Some(index) => {
            ctx.multi_signer.lock().reset(&group, index)?;
            let leader = if index == 0 {
                "this node".to_string()
            } else {
                group[0].to_string()
            };
            info!(
                "{} new round, group of {}, leader {}, signature threshold {}",
                tag,
                group.len(),
                leader,
                threshold
            );
        }
        None => {
            info!("{} this node is not in the consensus group", tag);
            ctx.cancel_round();
        }
    }
    spos_trace!("consensus.round.start", {
        "round": round.index(),
        "group_size": group.len(),
        "in_group": self_index.is_some(),
    });
    Ok(true)
}

pub(crate) fn check(ctx: &ConsensusContext) -> bool {
    ctx.state.read().round_index() == ctx.current_round().index()
}
