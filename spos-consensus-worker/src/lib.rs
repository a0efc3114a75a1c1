// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Round-based Secure Proof of Stake consensus.
//!
//! Time is split into rounds of fixed duration and every round into subrounds. The
//! chronology thread walks through the subrounds of the current round, running each
//! subround job once and waiting for its check to pass before its deadline. A second thread
//! decodes the messages received on the consensus topic and folds them into the shared
//! consensus state, waking the chronology up after each accepted contribution.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]
#[macro_use]
extern crate spos_logging;

mod broadcast;
mod chronology;
mod clock;
mod context;
mod controller;
mod factory;
mod group_selection;
mod manager;
mod phases;
mod state;
mod subround;
mod worker;

pub use clock::start_ntp_sync_timer;
pub use group_selection::IndexHashedGroupSelector;
pub use worker::start_consensus_worker;

#[cfg(test)]
mod tests;
