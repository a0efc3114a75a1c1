// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::phases::Phase;
use crate::subround::Subround;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_consensus_exports::ConsensusConfig;
use spos_models::subround::SubroundId;

/// Builds the subrounds of the configured schedule, chained in order.
/// The first follows `BEFORE_ROUND` and the last leads to `AFTER_ROUND`.
pub(crate) fn create_subrounds(cfg: &ConsensusConfig) -> ConsensusResult<Vec<Subround>> {
    let schedule = cfg.schedule();
    let mut subrounds = Vec::with_capacity(schedule.len());
    for (position, timing) in schedule.iter().enumerate() {
        let phase = Phase::for_subround(timing.id).ok_or_else(|| {
            ConsensusError::ConfigError(format!("no phase for subround {}", timing.id))
        })?;
        if timing.start_percent >= timing.end_percent || timing.end_percent > 100 {
            return Err(ConsensusError::ConfigError(format!(
                "subround {} spans {}%..{}%",
                timing.id, timing.start_percent, timing.end_percent
            )));
        }
        let previous = match position {
            0 => SubroundId::BEFORE_ROUND,
            _ => schedule[position - 1].id,
        };
        let next = schedule
            .get(position + 1)
            .map(|timing| timing.id)
            .unwrap_or(SubroundId::AFTER_ROUND);
        if next <= timing.id {
            return Err(ConsensusError::ConfigError(format!(
                "subround {} is followed by {}",
                timing.id, next
            )));
        }
        subrounds.push(Subround::new(
            previous,
            next,
            cfg.round_offset(timing.start_percent),
            cfg.round_offset(timing.end_percent),
            phase,
        ));
    }
    Ok(subrounds)
}
