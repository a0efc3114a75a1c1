// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::{ConsensusError, ConsensusResult};
use crate::Messenger;
use parking_lot::Mutex;
use spos_channel::sender::SposSender;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct NetworkState {
    subscribers: HashMap<String, Vec<(usize, SposSender<Vec<u8>>)>>,
    published: HashMap<String, Vec<(usize, Vec<u8>)>>,
    offline: HashSet<usize>,
}

/// In-memory gossip network shared by the nodes of a test.
/// Messages are delivered to every subscriber of the topic except the sender.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LocalNetwork {
    /// Empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Messenger of node `node_id`
    pub fn messenger(&self, node_id: usize) -> LocalMessenger {
        LocalMessenger {
            node_id,
            network: self.clone(),
        }
    }

    /// An offline node neither sends nor receives
    pub fn set_online(&self, node_id: usize, online: bool) {
        let mut state = self.state.lock();
        if online {
            state.offline.remove(&node_id);
        } else {
            state.offline.insert(node_id);
        }
    }

    /// Every message published on `topic` so far, with its sender
    pub fn published(&self, topic: &str) -> Vec<(usize, Vec<u8>)> {
        self.state
            .lock()
            .published
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    fn publish(&self, from: usize, topic: &str, data: Vec<u8>) {
        let mut state = self.state.lock();
        if state.offline.contains(&from) {
            debug!("node {} is offline, dropping message on {}", from, topic);
            return;
        }
        let targets: Vec<SposSender<Vec<u8>>> = state
            .subscribers
            .get(topic)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter(|(node_id, _)| *node_id != from && !state.offline.contains(node_id))
                    .map(|(_, sender)| sender.clone())
                    .collect()
            })
            .unwrap_or_default();
        state
            .published
            .entry(topic.to_string())
            .or_default()
            .push((from, data.clone()));
        drop(state);
        for target in targets {
            if let Err(err) = target.try_send(data.clone()) {
                debug!("local network dropped a message on {}: {}", topic, err);
            }
        }
    }
}

/// `Messenger` of one node of a `LocalNetwork`
#[derive(Clone)]
pub struct LocalMessenger {
    node_id: usize,
    network: LocalNetwork,
}

impl Messenger for LocalMessenger {
    fn broadcast(&self, topic: &str, data: Vec<u8>) -> ConsensusResult<()> {
        if topic.is_empty() {
            return Err(ConsensusError::MessengerError("empty topic".into()));
        }
        self.network.publish(self.node_id, topic, data);
        Ok(())
    }

    fn subscribe(&self, topic: &str, sender: SposSender<Vec<u8>>) -> ConsensusResult<()> {
        self.network
            .state
            .lock()
            .subscribers
            .entry(topic.to_string())
            .or_default()
            .push((self.node_id, sender));
        Ok(())
    }
}
