// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use crossbeam::channel::{select, Receiver};
use spos_channel::receiver::SposReceiver;
use spos_consensus_exports::error::ConsensusError;
use spos_models::message::{decode_message, ConsensusMessageDeserializer};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// Decodes the messages of the consensus topic and hands them to the consensus state
pub(crate) struct MessageWorker {
    ctx: Arc<ConsensusContext>,
    inbound: SposReceiver<Vec<u8>>,
    stop: Receiver<()>,
    deserializer: ConsensusMessageDeserializer,
}

impl MessageWorker {
    pub(crate) fn spawn(
        ctx: Arc<ConsensusContext>,
        inbound: SposReceiver<Vec<u8>>,
        stop: Receiver<()>,
    ) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("consensus message worker".into())
            .spawn(move || {
                let deserializer =
                    ConsensusMessageDeserializer::new(ctx.cfg.max_message_payload_size);
                let this = MessageWorker {
                    ctx,
                    inbound,
                    stop,
                    deserializer,
                };
                this.run();
            })
            .expect("could not spawn consensus message worker thread")
    }

    fn run(self) {
        loop {
            select! {
                recv(self.stop) -> _ => break,
                recv(self.inbound) -> bytes => match bytes {
                    Ok(bytes) => self.handle(&bytes),
                    Err(_) => break,
                },
            }
        }
        info!("consensus message worker stopped");
    }

    pub(crate) fn handle(&self, bytes: &[u8]) {
        let msg = match decode_message(&self.deserializer, bytes) {
            Ok(msg) => msg,
            Err(err) => {
                debug!("undecodable consensus message: {}", err);
                return;
            }
        };
        spos_trace!("consensus.message.received", {
            "round": msg.round_index,
            "type": format!("{:?}", msg.msg_type),
            "sender": msg.pub_key.to_string(),
        });
        match self.ctx.receive_message(msg) {
            Ok(()) => {}
            Err(ConsensusError::DuplicateContribution(reason)) => {
                debug!("duplicate consensus message ignored: {}", reason)
            }
            Err(err) => debug!("consensus message rejected: {}", err),
        }
    }
}
