// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use spos_consensus_exports::{ConsensusController, ConsensusStatus};
use spos_models::block::BlockHeader;
use spos_signature::PublicKey;
use std::sync::Arc;

/// Reads the consensus state shared with the consensus threads.
/// What it returns may already be outdated by the time the caller looks at it.
#[derive(Clone)]
pub struct ConsensusControllerImpl {
    ctx: Arc<ConsensusContext>,
}

impl ConsensusControllerImpl {
    pub(crate) fn new(ctx: Arc<ConsensusContext>) -> Self {
        ConsensusControllerImpl { ctx }
    }
}

impl ConsensusController for ConsensusControllerImpl {
    fn get_consensus_status(&self) -> ConsensusStatus {
        self.ctx.status()
    }

    fn get_last_committed_header(&self) -> Option<BlockHeader> {
        self.ctx.chain.read().current_header().cloned()
    }

    fn get_public_key(&self) -> PublicKey {
        self.ctx.pub_key
    }

    fn clone_box(&self) -> Box<dyn ConsensusController> {
        Box::new(self.clone())
    }
}
