// Copyright (c) 2022 MASSA LABS <info@massa.net>

use super::tools::{bls_phases, bn_phases, fixed_group_selector, TestCluster};
use crate::phases::{self, Phase};
use assert_matches::assert_matches;
use spos_consensus_exports::error::ConsensusError;
use spos_consensus_exports::ConsensusVariant;
use spos_hash::Hash;
use spos_models::block::{BlockHeaderDeserializer, BlockHeaderSerializer, MiniBlock, ShardId};
use spos_models::message::{ConsensusMessage, MessageType};
use spos_models::subround::{SubroundId, SubroundStatus};
use spos_serialization::{DeserializeError, Deserializer, Serializer};
use spos_signature::{Bitmap, Ed25519MultiSigner, MultiSigner, PublicKey};
use spos_time::SposTime;
use std::sync::Arc;

fn assert_all_committed(cluster: &TestCluster, round: i64) {
    let reference = cluster.nodes[0].processor.committed();
    assert_eq!(reference.len(), 1);
    assert_eq!(reference[0].round, round);
    assert_eq!(reference[0].nonce, 1);
    for node in &cluster.nodes {
        assert_eq!(node.processor.committed(), reference);
        let chain = node.ctx.chain.read();
        assert_eq!(chain.current_header(), Some(&reference[0]));
        assert_eq!(chain.next_nonce(), 2);
        assert_eq!(*node.ctx.commits.lock(), (1, Some(round)));
    }
}

#[test]
fn test_bls_round_commits_on_every_node() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases());
    assert_all_committed(&cluster, 0);

    // the sealed header carries an aggregate of the whole group
    let header = cluster.nodes[0].processor.committed()[0].clone();
    let group: Vec<PublicKey> = cluster
        .nodes
        .iter()
        .map(|node| node.keypair.get_public_key())
        .collect();
    let mut verifier = Ed25519MultiSigner::new(&cluster.nodes[1].keypair);
    verifier.reset(&group, 1).unwrap();
    verifier.set_message(cluster.ctx(1).state.read().data().unwrap());
    let bitmap = Bitmap::from_bytes(header.pub_keys_bitmap.clone());
    assert_eq!(bitmap.count_ones(), 4);
    verifier.verify(&header.signature, &bitmap).unwrap();

    let status = cluster.ctx(2).status();
    assert_eq!(status.round_index, 0);
    assert_eq!(status.committed_blocks, 1);
    assert_eq!(status.leader, Some(group[0]));
    assert!(status.in_consensus_group);
    assert!(!status.round_canceled);
    assert_eq!(status.round_failure, None);
    assert!(status
        .subround_statuses
        .iter()
        .all(|(_, status)| *status == SubroundStatus::Finished));
}

#[test]
fn test_bellare_neven_round_commits_on_every_node() {
    let mut cluster = TestCluster::new(ConsensusVariant::BellareNeven, 4);
    cluster.run_phases(&bn_phases());
    assert_all_committed(&cluster, 0);
    for node in &cluster.nodes {
        let state = node.ctx.state.read();
        assert_eq!(state.bitmap().map(Bitmap::count_ones), Some(4));
        let sealed = state.header().unwrap();
        assert_eq!(sealed.pub_keys_bitmap, state.bitmap().unwrap().as_bytes());
        assert!(!sealed.signature.is_empty());
    }
}

#[test]
fn test_leader_processes_nothing_it_proposed() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases()[..2]);
    assert!(cluster.nodes[0].processor.processed().is_empty());
    for node in &cluster.nodes[1..] {
        assert_eq!(node.processor.processed().len(), 1);
    }
}

#[test]
fn test_duplicate_signature_is_reported() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases()[..3]);
    let (_, share) = cluster
        .published()
        .into_iter()
        .find(|(from, msg)| *from == 1 && msg.msg_type == MessageType::Signature)
        .unwrap();
    assert_matches!(
        cluster.ctx(0).receive_message(share),
        Err(ConsensusError::DuplicateContribution(_))
    );
    assert_eq!(cluster.ctx(0).state.read().count_job_done(SubroundId::SIGNATURE), 4);
}

#[test]
fn test_commitment_not_matching_its_hash_is_rejected() {
    let mut cluster = TestCluster::new(ConsensusVariant::BellareNeven, 4);
    cluster.run_phases(&bn_phases()[..4]);
    // everyone but node 1 reveals its commitment
    for node in [0, 2, 3] {
        assert!(cluster.job(node, Phase::Commitment).unwrap());
    }
    cluster.deliver();
    assert!(!cluster.check(0, Phase::Commitment));

    let data = cluster.ctx(0).state.read().data().unwrap().to_vec();
    let forged = ConsensusMessage::new_signed(
        &cluster.nodes[1].keypair,
        MessageType::Commitment,
        data,
        vec![7u8; 32],
        0,
        cluster.timer_now(),
    )
    .unwrap();
    assert_matches!(
        phases::commitment::received(cluster.ctx(0), &forged),
        Err(ConsensusError::CommitmentHashDoesNotMatch(1))
    );
    let state = cluster.ctx(0).state.read();
    assert!(!state.job_done(&cluster.nodes[1].keypair.get_public_key(), SubroundId::COMMITMENT));
    drop(state);
    assert!(!cluster.check(0, Phase::Commitment));
}

#[test]
fn test_early_contributions_wait_for_their_subround() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    // node 3 is late and has not started the round
    for node in 0..3 {
        assert!(cluster.job(node, Phase::StartRound).unwrap());
        assert!(cluster.check(node, Phase::StartRound));
    }
    assert!(cluster.job(0, Phase::Block).unwrap());
    cluster.deliver();
    for node in 0..3 {
        assert!(cluster.check(node, Phase::Block));
    }
    for node in 0..3 {
        assert!(cluster.job(node, Phase::Signature).unwrap());
    }
    cluster.deliver();
    assert_eq!(cluster.ctx(3).buckets.lock().pending_len(), 5);

    assert!(cluster.job(3, Phase::StartRound).unwrap());
    assert!(cluster.check(3, Phase::StartRound));
    // the proposal went through, the shares wait for the block subround
    assert_eq!(cluster.ctx(3).buckets.lock().pending_len(), 3);
    assert!(cluster.ctx(3).state.read().data().is_some());
    assert!(!cluster.ctx(3).state.read().is_finished(SubroundId::BLOCK));

    assert!(cluster.check(3, Phase::Block));
    assert_eq!(cluster.ctx(3).buckets.lock().pending_len(), 0);
    assert!(cluster.check(3, Phase::Signature));
    assert!(cluster.job(3, Phase::EndRound).unwrap());
    assert_eq!(cluster.nodes[3].processor.committed().len(), 1);
}

#[test]
fn test_invalid_envelopes_are_rejected() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases()[..1]);
    assert!(cluster.job(0, Phase::Block).unwrap());
    let (_, header_msg) = cluster
        .published()
        .into_iter()
        .find(|(_, msg)| msg.msg_type == MessageType::BlockHeader)
        .unwrap();

    let mut tampered = header_msg.clone();
    tampered.payload[0] ^= 1;
    assert_matches!(
        cluster.ctx(1).receive_message(tampered),
        Err(ConsensusError::InvalidEnvelope(_))
    );

    assert_matches!(
        cluster.ctx(0).receive_message(header_msg.clone()),
        Err(ConsensusError::InvalidEnvelope(_))
    );

    let far_ahead = ConsensusMessage::new_signed(
        &cluster.nodes[0].keypair,
        MessageType::BlockHeader,
        header_msg.block_header_hash.clone(),
        header_msg.payload.clone(),
        5,
        cluster.timer_now(),
    )
    .unwrap();
    assert_matches!(
        cluster.ctx(1).receive_message(far_ahead),
        Err(ConsensusError::InvalidEnvelope(_))
    );
    assert_eq!(cluster.ctx(1).buckets.lock().pending_len(), 0);

    // the genuine header is still welcome
    cluster.ctx(1).receive_message(header_msg).unwrap();
}

#[test]
fn test_proposal_from_a_follower_is_rejected() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases()[..1]);
    assert!(cluster.job(0, Phase::Block).unwrap());
    let (_, body_msg) = cluster
        .published()
        .into_iter()
        .find(|(_, msg)| msg.msg_type == MessageType::BlockBody)
        .unwrap();
    let from_follower = ConsensusMessage::new_signed(
        &cluster.nodes[1].keypair,
        MessageType::BlockBody,
        body_msg.block_header_hash.clone(),
        body_msg.payload.clone(),
        0,
        cluster.timer_now(),
    )
    .unwrap();
    assert_matches!(
        phases::block::received_block_part(cluster.ctx(2), &from_follower),
        Err(ConsensusError::InvalidEnvelope(_))
    );
    assert!(cluster.ctx(2).state.read().data().is_none());
}

#[test]
fn test_proposal_with_unknown_parent_is_rejected() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases()[..1]);
    assert!(cluster.job(0, Phase::Block).unwrap());
    let published = cluster.published();
    let find = |msg_type: MessageType| {
        published
            .iter()
            .find(|(_, msg)| msg.msg_type == msg_type)
            .map(|(_, msg)| msg.clone())
            .unwrap()
    };
    let body_msg = find(MessageType::BlockBody);
    let header_msg = find(MessageType::BlockHeader);

    let (_, mut header) = BlockHeaderDeserializer::new()
        .deserialize::<DeserializeError>(&header_msg.payload)
        .unwrap();
    header.prev_hash = Hash::compute_from(b"another chain");
    let data = header.compute_hash().unwrap().to_bytes().to_vec();
    let mut header_bytes = Vec::new();
    BlockHeaderSerializer::new()
        .serialize(&header, &mut header_bytes)
        .unwrap();

    let leader = &cluster.nodes[0].keypair;
    let now = cluster.timer_now();
    let forged_body = ConsensusMessage::new_signed(
        leader,
        MessageType::BlockBody,
        data.clone(),
        body_msg.payload.clone(),
        0,
        now,
    )
    .unwrap();
    let forged_header =
        ConsensusMessage::new_signed(leader, MessageType::BlockHeader, data, header_bytes, 0, now)
            .unwrap();
    phases::block::received_block_part(cluster.ctx(1), &forged_body).unwrap();
    assert_matches!(
        phases::block::received_block_part(cluster.ctx(1), &forged_header),
        Err(ConsensusError::InvalidEnvelope(_))
    );
    assert!(cluster.ctx(1).state.read().data().is_none());
    assert!(cluster.nodes[1].processor.processed().is_empty());
}

#[test]
fn test_failed_commit_is_reverted() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases()[..3]);
    cluster.nodes[0].processor.set_fail_commits(true);
    assert_matches!(
        cluster.job(0, Phase::EndRound),
        Err(ConsensusError::CommitFailure(_))
    );
    assert_eq!(cluster.nodes[0].processor.reverts(), 1);
    assert!(cluster.ctx(0).chain.read().current_header().is_none());
    assert!(!cluster.check(0, Phase::EndRound));
    assert_eq!(cluster.ctx(0).status().committed_blocks, 0);

    // the other nodes are not affected
    assert!(cluster.job(1, Phase::EndRound).unwrap());
    assert!(cluster.check(1, Phase::EndRound));
}

#[test]
fn test_messages_of_a_canceled_round_are_dropped() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases()[..1]);
    cluster.ctx(1).cancel_round();
    assert!(cluster.job(0, Phase::Block).unwrap());
    cluster.deliver();
    assert!(cluster.ctx(1).state.read().data().is_none());
    assert_eq!(cluster.ctx(1).buckets.lock().pending_len(), 0);
    assert!(cluster.ctx(2).state.read().data().is_some());
}

#[test]
fn test_node_outside_the_group_sits_the_round_out() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 2);
    // both nodes draw a group made only of node 0
    let group = vec![cluster.nodes[0].keypair.get_public_key()];
    for node in &mut cluster.nodes {
        let ctx = Arc::get_mut(&mut node.ctx).unwrap();
        ctx.group_selector = Arc::new(fixed_group_selector(group.clone()));
    }
    assert!(cluster.job(1, Phase::StartRound).unwrap());
    let state = cluster.ctx(1).state.read();
    assert!(state.round_canceled());
    assert_eq!(state.self_index(), None);
    drop(state);

    // a group of one commits on its own
    cluster.nodes.truncate(1);
    cluster.run_phases(&bls_phases());
    assert_eq!(cluster.nodes[0].processor.committed().len(), 1);
}

#[test]
fn test_new_round_forgets_the_previous_one() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases());
    cluster.timer.advance(2000);
    let genesis = cluster.cfg.genesis_timestamp;
    let now = cluster.timer_now();
    for node in &cluster.nodes {
        assert!(node.ctx.round.write().update_round(genesis, now));
    }
    cluster.run_phases(&bls_phases());
    let committed = cluster.nodes[2].processor.committed();
    assert_eq!(committed.len(), 2);
    assert_eq!(committed[1].round, 1);
    assert_eq!(committed[1].nonce, 2);
    assert_eq!(committed[1].prev_rand_seed, committed[0].rand_seed);
    assert_eq!(*cluster.ctx(2).commits.lock(), (2, Some(1)));
    assert_eq!(
        cluster.ctx(2).round.read().time_stamp(),
        genesis.saturating_add(SposTime::from_millis(2000))
    );
}

/// Bitmap of round 0 sent by node 0, the leader
fn leader_bitmap(cluster: &TestCluster, payload: Vec<u8>) -> ConsensusMessage {
    let data = cluster.ctx(0).state.read().data().unwrap().to_vec();
    ConsensusMessage::new_signed(
        &cluster.nodes[0].keypair,
        MessageType::Bitmap,
        data,
        payload,
        0,
        cluster.timer_now(),
    )
    .unwrap()
}

#[test]
fn test_bitmap_too_short_for_the_group_is_rejected() {
    let mut cluster = TestCluster::new(ConsensusVariant::BellareNeven, 9);
    cluster.run_phases(&bn_phases()[..3]);
    // a single byte holds 8 of the 9 members
    let short = leader_bitmap(&cluster, vec![0xff]);
    assert_matches!(
        phases::bitmap::received(cluster.ctx(1), &short),
        Err(ConsensusError::InvalidBitmap(_))
    );
    let state = cluster.ctx(1).state.read();
    assert!(state.bitmap().is_none());
    assert_eq!(state.count_job_done(SubroundId::BITMAP), 0);
}

#[test]
fn test_bitmap_under_the_threshold_is_rejected() {
    let mut cluster = TestCluster::new(ConsensusVariant::BellareNeven, 4);
    cluster.run_phases(&bn_phases()[..3]);
    let mut bitmap = Bitmap::new(4);
    bitmap.set(0);
    bitmap.set(1);
    let sparse = leader_bitmap(&cluster, bitmap.as_bytes().to_vec());
    assert_matches!(
        phases::bitmap::received(cluster.ctx(2), &sparse),
        Err(ConsensusError::InvalidBitmap(_))
    );
    assert!(cluster.ctx(2).state.read().bitmap().is_none());
    assert!(!cluster.check(2, Phase::Bitmap));
}

#[test]
fn test_end_round_commits_once_per_round() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases());
    for node in [0, 1] {
        assert!(cluster.job(node, Phase::EndRound).unwrap());
        assert!(cluster.check(node, Phase::EndRound));
        assert_eq!(cluster.nodes[node].processor.committed().len(), 1);
        assert_eq!(*cluster.ctx(node).commits.lock(), (1, Some(0)));
        assert_eq!(cluster.ctx(node).chain.read().next_nonce(), 2);
    }
}

#[test]
fn test_contribution_of_a_finished_round_is_not_recorded() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    cluster.run_phases(&bls_phases()[..2]);
    assert!(cluster.job(1, Phase::Signature).unwrap());
    let (_, share) = cluster
        .published()
        .into_iter()
        .find(|(from, msg)| *from == 1 && msg.msg_type == MessageType::Signature)
        .unwrap();

    // node 2 moved on to round 1 after the share passed the envelope checks
    cluster.ctx(2).state.write().reset_for_round(1);
    assert_matches!(
        phases::signature::received(cluster.ctx(2), &share),
        Err(ConsensusError::InvalidEnvelope(_))
    );
    assert_eq!(
        cluster.ctx(2).state.read().count_job_done(SubroundId::SIGNATURE),
        0
    );
}

#[test]
fn test_leader_fans_the_block_out_to_other_shards() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 4);
    let mini_block = |receiver: u32| MiniBlock {
        sender_shard: ShardId(0),
        receiver_shard: ShardId(receiver),
        tx_hashes: vec![Hash::compute_from(&receiver.to_be_bytes())],
    };
    cluster.nodes[0]
        .processor
        .set_mini_blocks(vec![mini_block(0), mini_block(2)]);
    cluster.run_phases(&bls_phases());
    assert_all_committed(&cluster, 0);

    let network = &cluster.network;
    for topic in [
        "headers_0",
        "txBlockBodies_0",
        "txBlockBodies_0_2",
        "transactions_0_2",
    ] {
        let published = network.published(topic);
        assert_eq!(published.len(), 1, "{}", topic);
        assert_eq!(published[0].0, 0, "{}", topic);
    }
    // the own shard already has the mini-block
    assert!(network.published("txBlockBodies_0_0").is_empty());
    assert!(network.published("transactions_0_0").is_empty());
    assert_eq!(
        cluster.nodes[0].processor.committed()[0].mini_block_headers.len(),
        2
    );
}
