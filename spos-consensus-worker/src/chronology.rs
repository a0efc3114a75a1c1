// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Drives the subrounds of every round from the synchronized clock

use crate::context::{ChronologyView, ConsensusContext};
use crate::subround::Subround;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use spos_channel::receiver::SposReceiver;
use spos_models::subround::SubroundId;
use spos_time::SposTime;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) struct Chronology {
    ctx: Arc<ConsensusContext>,
    subrounds: Vec<Subround>,
    positions: HashMap<SubroundId, usize>,
    /// subround this node works on
    self_subround: SubroundId,
    /// subround the clock falls into
    time_subround: SubroundId,
    clock_offset: i64,
    last_offset_update: SposTime,
    notifier: SposReceiver<()>,
    stop: Receiver<()>,
}

impl Chronology {
    pub(crate) fn new(
        ctx: Arc<ConsensusContext>,
        subrounds: Vec<Subround>,
        notifier: SposReceiver<()>,
        stop: Receiver<()>,
    ) -> Self {
        let positions = subrounds
            .iter()
            .enumerate()
            .map(|(position, subround)| (subround.current, position))
            .collect();
        Chronology {
            ctx,
            subrounds,
            positions,
            self_subround: SubroundId::BEFORE_ROUND,
            time_subround: SubroundId::UNKNOWN,
            clock_offset: 0,
            last_offset_update: SposTime::from_millis(0),
            notifier,
            stop,
        }
    }

    /// Loops until the stop channel fires or is dropped
    pub(crate) fn run(mut self) {
        let now = self.ctx.sync_timer.current_time();
        self.init_round(now);
        let quantum = self.ctx.cfg.chronology_quantum.to_duration();
        loop {
            match self.stop.recv_timeout(quantum) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            self.start_rounds();
        }
        info!("consensus chronology stopped");
    }

    /// One iteration: follow the clock, then run the subround this node is due for
    pub(crate) fn start_rounds(&mut self) {
        let now = self.ctx.sync_timer.current_time();
        self.update_round(now);
        if self.ctx.current_round().index() < 0 {
            return;
        }
        let Some(target) = self.target_subround() else {
            return;
        };
        let Some(&position) = self.positions.get(&target) else {
            return;
        };
        if target != self.self_subround {
            debug!(
                "skipping from {} to {}, following the clock",
                self.self_subround, target
            );
            self.self_subround = target;
        }
        let subround = &mut self.subrounds[position];
        let done = subround.do_work(&self.ctx, &self.notifier, &self.stop);
        self.self_subround = if done {
            subround.next
        } else {
            debug!(
                "{} left {} (previous {}) without finishing it",
                self.ctx.log_tag(),
                subround.name(),
                subround.previous
            );
            SubroundId::BEFORE_ROUND
        };
        if done {
            self.ctx.process_pending();
        }
        self.publish_view();
    }

    /// Moves to the round containing `now`, resetting the chronology when the round changes
    pub(crate) fn update_round(&mut self, now: SposTime) {
        let genesis = self.ctx.cfg.genesis_timestamp;
        let changed = self.ctx.round.write().update_round(genesis, now);
        if changed {
            self.init_round(now);
        }
        self.time_subround = self.compute_time_subround(now);
        self.publish_view();
    }

    /// Restarts the walk of the subrounds, refreshing the clock offset at most once per instant
    pub(crate) fn init_round(&mut self, now: SposTime) {
        self.self_subround = self
            .subrounds
            .first()
            .map(|subround| subround.current)
            .unwrap_or(SubroundId::BEFORE_ROUND);
        if now > self.last_offset_update {
            self.clock_offset = self.ctx.sync_timer.clock_offset();
            self.last_offset_update = now;
        }
        let round = self.ctx.current_round();
        spos_trace!("consensus.chronology.new_round", {
            "round": round.index(),
            "time_stamp": round.time_stamp().to_millis(),
            "clock_offset": self.clock_offset,
        });
        debug!(
            "round {} starts at {}, clock offset {} ms",
            round.index(),
            round.time_stamp().format_instant(),
            self.clock_offset
        );
    }

    /// Subround the clock falls into
    pub(crate) fn compute_time_subround(&self, now: SposTime) -> SubroundId {
        let elapsed = self.ctx.current_round().time_in_round(now);
        if elapsed < 0 {
            return SubroundId::BEFORE_ROUND;
        }
        let elapsed = SposTime::from_millis(elapsed as u64);
        for subround in &self.subrounds {
            if subround.start_time <= elapsed && elapsed < subround.end_time {
                return subround.current;
            }
        }
        match self.subrounds.last() {
            Some(last) if elapsed >= last.end_time => SubroundId::AFTER_ROUND,
            _ => SubroundId::UNKNOWN,
        }
    }

    /// Subround to run now, if any. In sync mode the clock may pull this node ahead but
    /// never lets it run a subround whose slot has not come yet.
    fn target_subround(&self) -> Option<SubroundId> {
        if !self.self_subround.is_protocol_subround() {
            return None;
        }
        if !self.ctx.cfg.sync_mode {
            return Some(self.self_subround);
        }
        if self.time_subround.is_protocol_subround() && self.time_subround >= self.self_subround {
            Some(self.time_subround)
        } else {
            None
        }
    }

    fn publish_view(&self) {
        *self.ctx.chronology_view.write() = ChronologyView {
            self_subround: self.self_subround,
            time_subround: self.time_subround,
        };
    }

    #[cfg(test)]
    pub(crate) fn self_subround(&self) -> SubroundId {
        self.self_subround
    }

    #[cfg(test)]
    pub(crate) fn clock_offset(&self) -> i64 {
        self.clock_offset
    }
}
