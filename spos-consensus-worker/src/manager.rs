// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Stops the consensus threads. See `ConsensusManager` in `spos_consensus_exports`.

use crossbeam::channel::Sender;
use spos_consensus_exports::ConsensusManager;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Implementation of the consensus manager
pub struct ConsensusManagerImpl {
    /// chronology stop sender and join handle
    pub(crate) chronology: Option<(Sender<()>, JoinHandle<()>)>,

    /// message worker stop sender and join handle
    pub(crate) message_worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl ConsensusManager for ConsensusManagerImpl {
    /// stops the worker
    fn stop(&mut self) {
        info!("stopping consensus...");
        if let Some((stop_tx, join_handle)) = self.message_worker.take() {
            std::mem::drop(stop_tx);
            if let Err(err) = join_handle.join() {
                warn!("consensus message worker panicked: {:?}", err);
            }
        }
        if let Some((stop_tx, join_handle)) = self.chronology.take() {
            std::mem::drop(stop_tx);
            if let Err(err) = join_handle.join() {
                warn!("consensus chronology panicked: {:?}", err);
            }
        }
        info!("consensus stopped");
    }
}
