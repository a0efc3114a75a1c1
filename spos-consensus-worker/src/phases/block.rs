// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::context::ConsensusContext;
use spos_consensus_exports::error::{ConsensusError, ConsensusResult};
use spos_models::block::{
    BlockBody, BlockBodyDeserializer, BlockBodySerializer, BlockHeader, BlockHeaderDeserializer,
    BlockHeaderSerializer,
};
use spos_models::message::{ConsensusMessage, MessageType};
use spos_models::subround::SubroundId;
use spos_serialization::{DeserializeError, Deserializer, Serializer};
use spos_signature::{PublicKey, Signature};
use tracing::{debug, info, warn};

/// The leader builds the block of the round and proposes it. Other members wait for it.
pub(crate) fn job(ctx: &ConsensusContext) -> ConsensusResult<bool> {
    let round_index = {
        let state = ctx.state.read();
        if !state.is_leader_in_current_round() {
            return Ok(true);
        }
        state.round_index()
    };
    let round = ctx.current_round();
    let have_time = || ctx.have_time();

    let body = ctx
        .block_processor
        .create_block_body(round_index, &have_time)?;
    let mut header = ctx
        .block_processor
        .create_block_header(&body, round_index, &have_time)?;
    {
        let chain = ctx.chain.read();
        header.nonce = chain.next_nonce();
        header.prev_hash = chain.last_header_hash();
        header.prev_rand_seed = chain.rand_seed().to_vec();
    }
    header.round = round_index;
    header.shard_id = ctx.cfg.shard_id;
    header.time_stamp = round.time_stamp();
    header.rand_seed = ctx
        .keypair
        .sign_bytes(&header.prev_rand_seed)
        .to_bytes()
        .to_vec();
    header.body_hash = body.compute_hash()?;
    header.mini_block_headers = body.mini_block_headers()?;
    header.pub_keys_bitmap.clear();
    header.signature.clear();
    let data = header.compute_hash()?.to_bytes().to_vec();

    let mut body_bytes = Vec::new();
    BlockBodySerializer::new()
        .serialize(&body, &mut body_bytes)
        .map_err(|err| ConsensusError::HookFailure(err.to_string()))?;
    let mut header_bytes = Vec::new();
    BlockHeaderSerializer::new()
        .serialize(&header, &mut header_bytes)
        .map_err(|err| ConsensusError::HookFailure(err.to_string()))?;

    let nonce = header.nonce;
    {
        let mut state = ctx.state.write();
        if !state.set_proposal(data.clone(), header, body) {
            return Err(ConsensusError::HookFailure(
                "a block was already adopted in this round".into(),
            ));
        }
        let own = ctx.pub_key;
        state.set_job_done(&own, SubroundId::BLOCK, true)?;
    }
    ctx.multi_signer.lock().set_message(&data);

    ctx.send_message(MessageType::BlockBody, data.clone(), body_bytes)?;
    ctx.send_message(MessageType::BlockHeader, data, header_bytes)?;
    info!("{} proposed block with nonce {}", ctx.log_tag(), nonce);
    Ok(true)
}

pub(crate) fn check(ctx: &ConsensusContext) -> bool {
    let state = ctx.state.read();
    match state.leader() {
        Some(leader) => state.job_done(leader, SubroundId::BLOCK),
        None => false,
    }
}

fn decode<T>(deserializer: &impl Deserializer<T>, bytes: &[u8]) -> ConsensusResult<T> {
    let (rest, value) = deserializer
        .deserialize::<DeserializeError>(bytes)
        .map_err(|err| ConsensusError::InvalidEnvelope(err.to_string()))?;
    if !rest.is_empty() {
        return Err(ConsensusError::InvalidEnvelope(
            "trailing bytes after block part".into(),
        ));
    }
    Ok(value)
}

/// Stores a body or header sent by the leader; once both parts of the same proposal are
/// known, validates and processes the block
pub(crate) fn received_block_part(
    ctx: &ConsensusContext,
    msg: &ConsensusMessage,
) -> ConsensusResult<()> {
    let leader = {
        let state = ctx.state.read();
        let leader = state
            .leader()
            .copied()
            .ok_or_else(|| ConsensusError::PreconditionUnmet("no consensus group".into()))?;
        if msg.pub_key != leader {
            return Err(ConsensusError::InvalidEnvelope(format!(
                "block proposed by {} who does not lead the round",
                msg.pub_key
            )));
        }
        if state.data().is_some() {
            return Err(ConsensusError::DuplicateContribution(
                "a block was already adopted in this round".into(),
            ));
        }
        leader
    };

    let proposal = {
        let mut state = ctx.state.write();
        ConsensusContext::check_message_round(&state, msg)?;
        match msg.msg_type {
            MessageType::BlockBody => {
                let body: BlockBody = decode(&BlockBodyDeserializer::new(), &msg.payload)?;
                state.store_received_body(msg.block_header_hash.clone(), body);
            }
            _ => {
                let header: BlockHeader =
                    decode(&BlockHeaderDeserializer::new(), &msg.payload)?;
                state.store_received_header(msg.block_header_hash.clone(), header);
            }
        }
        state.received_proposal()
    };
    let Some((data, header, body)) = proposal else {
        debug!("{} waiting for the other half of the proposal", ctx.log_tag());
        return Ok(());
    };

    if let Err(err) = validate_proposal(ctx, &leader, &data, &header, &body) {
        warn!("{} rejected proposal of {}: {}", ctx.log_tag(), leader, err);
        return Err(err);
    }

    let nonce = header.nonce;
    {
        let mut state = ctx.state.write();
        ConsensusContext::check_message_round(&state, msg)?;
        if !state.set_proposal(data.clone(), header, body) {
            return Err(ConsensusError::DuplicateContribution(
                "a block was already adopted in this round".into(),
            ));
        }
        state.set_job_done(&leader, SubroundId::BLOCK, true)?;
    }
    ctx.multi_signer.lock().set_message(&data);
    info!(
        "{} received and processed block with nonce {}",
        ctx.log_tag(),
        nonce
    );
    Ok(())
}

/// Checks the proposal against the local chain, then lets the block processor execute it
fn validate_proposal(
    ctx: &ConsensusContext,
    leader: &PublicKey,
    data: &[u8],
    header: &BlockHeader,
    body: &BlockBody,
) -> ConsensusResult<()> {
    let invalid = |reason: &str| ConsensusError::InvalidEnvelope(format!("proposal {}", reason));
    let round_index = ctx.state.read().round_index();
    if header.round != round_index {
        return Err(invalid("is for another round"));
    }
    if header.shard_id != ctx.cfg.shard_id {
        return Err(invalid("is for another shard"));
    }
    if !header.pub_keys_bitmap.is_empty() || !header.signature.is_empty() {
        return Err(invalid("is already sealed"));
    }
    if header.compute_hash()?.to_bytes().as_slice() != data {
        return Err(invalid("does not match its fingerprint"));
    }
    if header.body_hash != body.compute_hash()? {
        return Err(invalid("body does not match the header"));
    }
    if header.mini_block_headers != body.mini_block_headers()? {
        return Err(invalid("mini-block headers do not match the body"));
    }
    let rand_seed = Signature::from_slice(&header.rand_seed)
        .map_err(|_| invalid("carries a malformed random seed"))?;
    leader
        .verify_bytes(&header.prev_rand_seed, &rand_seed)
        .map_err(|_| invalid("random seed is not signed by the leader"))?;

    let have_time = || ctx.have_time();
    let chain = ctx.chain.read().clone();
    if header.nonce != chain.next_nonce() {
        return Err(invalid("does not extend the local chain"));
    }
    if header.prev_hash != chain.last_header_hash() {
        return Err(invalid("has an unknown parent"));
    }
    if header.prev_rand_seed.as_slice() != chain.rand_seed() {
        return Err(invalid("starts from another random seed"));
    }
    ctx.block_processor
        .process_block(&chain, header, body, &have_time)
}
