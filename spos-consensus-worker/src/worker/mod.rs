// Copyright (c) 2022 MASSA LABS <info@massa.net>

pub(crate) mod buckets;
mod inbound;

use crate::chronology::Chronology;
use crate::context::ConsensusContext;
use crate::controller::ConsensusControllerImpl;
use crate::factory::create_subrounds;
use crate::manager::ConsensusManagerImpl;
use crossbeam::channel::bounded;
use spos_channel::SposChannel;
use spos_consensus_exports::error::ConsensusResult;
use spos_consensus_exports::{
    ConsensusChannels, ConsensusConfig, ConsensusController, ConsensusManager,
};
use spos_signature::KeyPair;
use std::sync::Arc;
use std::thread;
use tracing::info;

pub(crate) use inbound::MessageWorker;

/// Starts the consensus of this node: subscribes to the consensus topic of its shard, then
/// spawns the chronology thread and the message worker thread.
///
/// # Arguments
/// * `config`: consensus configuration
/// * `channels`: messenger, block processor, group selector and clock
/// * `keypair`: key of this node, used to sign every consensus message
///
/// # Returns
/// A manager stopping both threads and a controller reading the consensus status
pub fn start_consensus_worker(
    config: ConsensusConfig,
    channels: ConsensusChannels,
    keypair: KeyPair,
) -> ConsensusResult<(Box<dyn ConsensusManager>, Box<dyn ConsensusController>)> {
    config.validate()?;
    let subrounds = create_subrounds(&config)?;
    let (notifier_tx, notifier_rx) = SposChannel::new(
        "consensus_state_changed".to_string(),
        Some(config.notifier_capacity),
    );
    let (inbound_tx, inbound_rx) =
        SposChannel::new("consensus_inbound".to_string(), Some(config.channel_size));

    let ctx = Arc::new(ConsensusContext::new(
        config,
        channels,
        keypair,
        notifier_tx,
    )?);
    ctx.messenger.subscribe(&ctx.consensus_topic, inbound_tx)?;

    let (chronology_stop_tx, chronology_stop_rx) = bounded::<()>(1);
    let chronology = Chronology::new(ctx.clone(), subrounds, notifier_rx, chronology_stop_rx);
    let chronology_handle = thread::Builder::new()
        .name("consensus chronology".into())
        .spawn(move || chronology.run())
        .expect("could not spawn consensus chronology thread");

    let (worker_stop_tx, worker_stop_rx) = bounded::<()>(1);
    let worker_handle = MessageWorker::spawn(ctx.clone(), inbound_rx, worker_stop_rx);

    info!(
        "consensus started on shard {} as {}",
        ctx.cfg.shard_id, ctx.pub_key
    );
    let manager = ConsensusManagerImpl {
        chronology: Some((chronology_stop_tx, chronology_handle)),
        message_worker: Some((worker_stop_tx, worker_handle)),
    };
    let controller = ConsensusControllerImpl::new(ctx);
    Ok((Box::new(manager), Box::new(controller)))
}
