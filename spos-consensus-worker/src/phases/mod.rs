// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Behavior of every subround of a round.
//!
//! Each phase module exposes the three hooks run by its subround: `job` does the local work
//! once per round, `check` tells whether the subround can be left, and `extend` is called when
//! the deadline passed first. Phases receiving contributions from the network also expose the
//! handler applying them to the consensus state.

pub(crate) mod bitmap;
pub(crate) mod block;
pub(crate) mod commitment;
pub(crate) mod commitment_hash;
pub(crate) mod end_round;
pub(crate) mod signature;
pub(crate) mod start_round;

use crate::context::ConsensusContext;
use spos_consensus_exports::error::ConsensusResult;
use spos_models::subround::SubroundId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    StartRound,
    Block,
    CommitmentHash,
    Bitmap,
    Commitment,
    Signature,
    EndRound,
}

impl Phase {
    pub(crate) fn for_subround(id: SubroundId) -> Option<Phase> {
        match id {
            SubroundId::START_ROUND => Some(Phase::StartRound),
            SubroundId::BLOCK => Some(Phase::Block),
            SubroundId::COMMITMENT_HASH => Some(Phase::CommitmentHash),
            SubroundId::BITMAP => Some(Phase::Bitmap),
            SubroundId::COMMITMENT => Some(Phase::Commitment),
            SubroundId::SIGNATURE => Some(Phase::Signature),
            SubroundId::END_ROUND => Some(Phase::EndRound),
            _ => None,
        }
    }

    pub(crate) fn subround(&self) -> SubroundId {
        match self {
            Phase::StartRound => SubroundId::START_ROUND,
            Phase::Block => SubroundId::BLOCK,
            Phase::CommitmentHash => SubroundId::COMMITMENT_HASH,
            Phase::Bitmap => SubroundId::BITMAP,
            Phase::Commitment => SubroundId::COMMITMENT,
            Phase::Signature => SubroundId::SIGNATURE,
            Phase::EndRound => SubroundId::END_ROUND,
        }
    }

    /// Local work of the subround. `Ok(false)` means the job could not be done this round.
    pub(crate) fn job(&self, ctx: &ConsensusContext) -> ConsensusResult<bool> {
        match self {
            Phase::StartRound => start_round::job(ctx),
            Phase::Block => block::job(ctx),
            Phase::CommitmentHash => commitment_hash::job(ctx),
            Phase::Bitmap => bitmap::job(ctx),
            Phase::Commitment => commitment::job(ctx),
            Phase::Signature => signature::job(ctx),
            Phase::EndRound => end_round::job(ctx),
        }
    }

    /// Whether the subround is done. Marks it finished when it is.
    pub(crate) fn check(&self, ctx: &ConsensusContext) -> bool {
        let done = match self {
            Phase::StartRound => start_round::check(ctx),
            Phase::Block => block::check(ctx),
            Phase::CommitmentHash => commitment_hash::check(ctx),
            Phase::Bitmap => bitmap::check(ctx),
            Phase::Commitment => commitment::check(ctx),
            Phase::Signature => signature::check(ctx),
            Phase::EndRound => end_round::check(ctx),
        };
        if done {
            ctx.finish_subround(self.subround());
        }
        done
    }

    pub(crate) fn extend(&self, ctx: &ConsensusContext) {
        ctx.extend_subround(self.subround());
    }
}
