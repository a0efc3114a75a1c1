// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use crate::phases::Phase;
use crossbeam::channel::{after, select, Receiver};
use spos_models::subround::SubroundId;
use spos_time::SposTime;
use std::time::Duration;
use tracing::warn;

/// One step of a round: a slice of the round duration, a phase and its links in the chain
pub(crate) struct Subround {
    pub previous: SubroundId,
    pub current: SubroundId,
    pub next: SubroundId,
    /// offset of the start inside the round
    pub start_time: SposTime,
    /// offset of the deadline inside the round
    pub end_time: SposTime,
    phase: Phase,
    /// round in which the job last ran
    job_round: Option<i64>,
}

impl Subround {
    pub(crate) fn new(
        previous: SubroundId,
        next: SubroundId,
        start_time: SposTime,
        end_time: SposTime,
        phase: Phase,
    ) -> Self {
        Subround {
            previous,
            current: phase.subround(),
            next,
            start_time,
            end_time,
            phase,
            job_round: None,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.current.name()
    }

    /// Milliseconds left before the deadline of this subround in the current round
    fn remaining(&self, ctx: &ConsensusContext) -> i64 {
        let round = ctx.current_round();
        let deadline = round.time_stamp().saturating_add(self.end_time);
        deadline.signed_diff(ctx.sync_timer.current_time())
    }

    /// Runs the job once per round, then waits for the check to pass.
    ///
    /// Returns true when the check passed before the deadline. Returns false when the round
    /// was not started or is canceled, when the job failed, when the deadline passed (the
    /// subround is then extended) and when the node is stopping.
    pub(crate) fn do_work(
        &mut self,
        ctx: &ConsensusContext,
        notifier: &Receiver<()>,
        stop: &Receiver<()>,
    ) -> bool {
        let round_index = ctx.current_round().index();
        if self.current != SubroundId::START_ROUND {
            let state = ctx.state.read();
            // a round this node did not start, or gave up on
            if state.round_canceled() || state.round_index() != round_index {
                return false;
            }
        }
        if self.remaining(ctx) <= 0 {
            self.phase.extend(ctx);
            return false;
        }

        if self.job_round != Some(round_index) {
            self.job_round = Some(round_index);
            match self.phase.job(ctx) {
                Ok(true) => {}
                Ok(false) => return false,
                Err(err) => {
                    warn!("{} job of {} failed: {}", ctx.log_tag(), self.name(), err);
                    ctx.fail_round(&err);
                    return false;
                }
            }
        }
        if self.phase.check(ctx) {
            return true;
        }

        loop {
            let remaining = self.remaining(ctx);
            if remaining <= 0 {
                self.phase.extend(ctx);
                return false;
            }
            let timeout = after(Duration::from_millis(remaining as u64));
            select! {
                recv(notifier) -> pulse => {
                    if pulse.is_err() {
                        return false;
                    }
                    if self.phase.check(ctx) {
                        return true;
                    }
                }
                recv(stop) -> _ => return false,
                recv(timeout) -> _ => {
                    if self.phase.check(ctx) {
                        return true;
                    }
                    self.phase.extend(ctx);
                    return false;
                }
            }
        }
    }
}
