// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::collaborator_traits::{BlockProcessor, Messenger, ValidatorGroupSelector};
use spos_time::SyncTimer;
use std::sync::Arc;

/// Collaborators handed to the consensus worker
#[derive(Clone)]
pub struct ConsensusChannels {
    /// gossip layer
    pub messenger: Arc<dyn Messenger>,
    /// block production and storage
    pub block_processor: Arc<dyn BlockProcessor>,
    /// consensus group draw
    pub group_selector: Arc<dyn ValidatorGroupSelector>,
    /// synchronized clock
    pub sync_timer: Arc<dyn SyncTimer>,
}
