// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This module exports generic traits representing interfaces for interacting
//! with the consensus worker.

use crate::status::ConsensusStatus;
use spos_models::block::BlockHeader;
use spos_signature::PublicKey;

/// Read access to the running consensus
#[cfg_attr(feature = "test-exports", mockall::automock)]
pub trait ConsensusController: Send + Sync {
    /// Snapshot of the current round
    fn get_consensus_status(&self) -> ConsensusStatus;

    /// Last header committed by this node, `None` until the first commit
    fn get_last_committed_header(&self) -> Option<BlockHeader>;

    /// Public key the node signs with
    fn get_public_key(&self) -> PublicKey;

    /// Returns a boxed clone of self.
    /// Useful to allow cloning `Box<dyn ConsensusController>`.
    fn clone_box(&self) -> Box<dyn ConsensusController>;
}

/// Allow cloning `Box<dyn ConsensusController>`
/// Uses `ConsensusController::clone_box` internally
impl Clone for Box<dyn ConsensusController> {
    fn clone(&self) -> Box<dyn ConsensusController> {
        self.clone_box()
    }
}

/// Consensus manager used to stop the consensus threads
pub trait ConsensusManager {
    /// Stops the chronology and message threads and waits for them
    fn stop(&mut self);
}
