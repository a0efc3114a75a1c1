// Copyright (c) 2022 MASSA LABS <info@massa.net>

use super::tools::{genesis, test_config, TestCluster, TestNode, CONSENSUS_TOPIC};
use crate::chronology::Chronology;
use crate::factory::create_subrounds;
use crate::phases::Phase;
use crossbeam::channel::{bounded, Sender};
use spos_channel::SposChannel;
use spos_consensus_exports::{ConsensusConfig, ConsensusVariant};
use spos_models::message::{decode_message, ConsensusMessageDeserializer};
use spos_models::subround::{SubroundId, SubroundStatus};
use spos_time::SposTime;
use std::thread;
use std::time::{Duration, Instant};

/// Chronology of node 0, positioned on the current round.
/// The returned sender keeps the stop channel open.
fn chronology_of(cluster: &mut TestCluster) -> (Chronology, Sender<()>) {
    let (_, spare) = SposChannel::new("test_spare_notifier".into(), Some(1));
    let node = &mut cluster.nodes[0];
    let notifier = std::mem::replace(&mut node.notifier, spare);
    let subrounds = create_subrounds(&node.ctx.cfg).unwrap();
    let (stop_tx, stop_rx) = bounded(1);
    let mut chronology = Chronology::new(node.ctx.clone(), subrounds, notifier, stop_rx);
    chronology.init_round(cluster.timer_now());
    (chronology, stop_tx)
}

fn at(millis_after_genesis: u64) -> SposTime {
    genesis().saturating_add(SposTime::from_millis(millis_after_genesis))
}

#[test]
fn test_time_subround_follows_the_schedule() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 1);
    let (chronology, _stop) = chronology_of(&mut cluster);
    // 2000ms rounds: StartRound 0..100, Block 100..500, Signature 500..1300, EndRound 1300..1500
    assert_eq!(chronology.compute_time_subround(at(50)), SubroundId::START_ROUND);
    assert_eq!(chronology.compute_time_subround(at(100)), SubroundId::BLOCK);
    assert_eq!(chronology.compute_time_subround(at(1299)), SubroundId::SIGNATURE);
    assert_eq!(chronology.compute_time_subround(at(1400)), SubroundId::END_ROUND);
    assert_eq!(chronology.compute_time_subround(at(1700)), SubroundId::AFTER_ROUND);
    assert_eq!(
        chronology.compute_time_subround(genesis().saturating_sub(SposTime::from_millis(5))),
        SubroundId::BEFORE_ROUND
    );
}

#[test]
fn test_single_validator_walks_whole_rounds() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 1);
    let (mut chronology, _stop) = chronology_of(&mut cluster);
    let ctx = cluster.nodes[0].ctx.clone();

    let mut walked = Vec::new();
    for _ in 0..4 {
        walked.push(chronology.self_subround());
        chronology.start_rounds();
    }
    assert_eq!(
        walked,
        vec![
            SubroundId::START_ROUND,
            SubroundId::BLOCK,
            SubroundId::SIGNATURE,
            SubroundId::END_ROUND
        ]
    );
    assert_eq!(chronology.self_subround(), SubroundId::AFTER_ROUND);
    let status = ctx.status();
    assert_eq!(status.self_subround, SubroundId::AFTER_ROUND);
    assert_eq!(status.committed_blocks, 1);
    assert!(status
        .subround_statuses
        .iter()
        .all(|(_, status)| *status == SubroundStatus::Finished));

    // nothing left to do until the next round
    chronology.start_rounds();
    assert_eq!(ctx.status().committed_blocks, 1);

    cluster.timer.advance(2000);
    for _ in 0..4 {
        chronology.start_rounds();
    }
    assert_eq!(ctx.status().round_index, 1);
    assert_eq!(ctx.status().committed_blocks, 2);
    assert_eq!(ctx.chain.read().next_nonce(), 3);
}

#[test]
fn test_sync_mode_waits_for_the_slot_of_each_subround() {
    let cfg = ConsensusConfig {
        sync_mode: true,
        ..test_config(ConsensusVariant::Bls, 1)
    };
    let mut cluster = TestCluster::with_config(cfg);
    let (mut chronology, _stop) = chronology_of(&mut cluster);
    let ctx = cluster.nodes[0].ctx.clone();

    chronology.start_rounds();
    assert_eq!(chronology.self_subround(), SubroundId::BLOCK);
    // the clock is still in the start-round slot
    chronology.start_rounds();
    assert_eq!(chronology.self_subround(), SubroundId::BLOCK);

    for (time, next) in [
        (200, SubroundId::SIGNATURE),
        (600, SubroundId::END_ROUND),
        (1350, SubroundId::AFTER_ROUND),
    ] {
        cluster.timer.set_time(at(time));
        chronology.start_rounds();
        assert_eq!(chronology.self_subround(), next);
    }
    assert_eq!(ctx.status().committed_blocks, 1);

    // late in the next round the clock pulls the node past a start it never ran
    cluster.timer.set_time(at(2000 + 1350));
    chronology.start_rounds();
    assert_eq!(chronology.self_subround(), SubroundId::BEFORE_ROUND);
    assert_eq!(ctx.status().round_index, 1);
    assert_eq!(ctx.state.read().round_index(), 0);
    assert_eq!(ctx.status().committed_blocks, 1);
}

#[test]
fn test_clock_offset_is_refreshed_on_new_rounds() {
    let mut cluster = TestCluster::with_clock(
        test_config(ConsensusVariant::Bls, 1),
        genesis().saturating_sub(SposTime::from_millis(500)),
    );
    let (mut chronology, _stop) = chronology_of(&mut cluster);
    let ctx = cluster.nodes[0].ctx.clone();
    assert_eq!(ctx.current_round().index(), -1);

    // nothing runs before genesis
    chronology.start_rounds();
    assert_eq!(ctx.status().self_subround, SubroundId::START_ROUND);
    assert_eq!(ctx.state.read().round_index(), i64::MIN);
    assert_eq!(chronology.clock_offset(), 0);

    cluster.timer.set_offset(300);
    cluster.timer.set_time(at(10));
    chronology.update_round(cluster.timer_now());
    assert_eq!(chronology.clock_offset(), 300);
    assert_eq!(ctx.current_round().index(), 0);
    assert_eq!(ctx.current_round().time_stamp(), genesis());
    assert_eq!(
        chronology.compute_time_subround(cluster.timer_now()),
        SubroundId::BLOCK
    );

    // a clock jumping back never moves the round backwards
    cluster
        .timer
        .set_time(genesis().saturating_sub(SposTime::from_millis(1000)));
    chronology.update_round(cluster.timer_now());
    assert_eq!(ctx.current_round().index(), 0);
}

#[test]
fn test_missed_deadline_extends_and_cancels() {
    let mut cluster = TestCluster::new(ConsensusVariant::Bls, 2);
    // node 1 follows node 0, which never proposes
    let ctx = cluster.nodes[1].ctx.clone();
    let (_, notifier) = SposChannel::new::<()>("test_deadline_notifier".into(), Some(1));
    let (_stop_tx, stop) = bounded(1);
    let mut subrounds = create_subrounds(&ctx.cfg).unwrap();

    assert!(subrounds[0].do_work(&ctx, &notifier, &stop));
    assert!(!ctx.state.read().is_leader_in_current_round());

    cluster.timer.set_time(at(600));
    assert!(!subrounds[1].do_work(&ctx, &notifier, &stop));
    let state = ctx.state.read();
    assert_eq!(state.status(SubroundId::BLOCK), SubroundStatus::Extended);
    assert!(state.round_canceled());
    drop(state);
    let failure = ctx.status().round_failure.unwrap();
    assert!(failure.starts_with("deadline exceeded"), "{}", failure);

    // later subrounds of a canceled round do nothing
    assert!(!subrounds[2].do_work(&ctx, &notifier, &stop));
    assert_eq!(
        ctx.state.read().status(SubroundId::SIGNATURE),
        SubroundStatus::NotFinished
    );
}

#[test]
fn test_accepted_contribution_wakes_the_waiting_subround() {
    let cfg = ConsensusConfig {
        round_duration: SposTime::from_millis(20_000),
        ..test_config(ConsensusVariant::Bls, 2)
    };
    let mut cluster = TestCluster::with_config(cfg);
    cluster.run_phases(&[Phase::StartRound]);

    let TestNode {
        ctx: follower,
        notifier,
        ..
    } = cluster.nodes.remove(1);
    let waiting = follower.clone();
    let mut subrounds = create_subrounds(&follower.cfg).unwrap();
    let (_stop_tx, stop) = bounded(1);
    let started = Instant::now();
    let waiter = thread::spawn(move || {
        let done = subrounds[1].do_work(&waiting, &notifier, &stop);
        (done, started.elapsed())
    });

    thread::sleep(Duration::from_millis(50));
    assert!(cluster.job(0, Phase::Block).unwrap());
    let deserializer = ConsensusMessageDeserializer::new(cluster.cfg.max_message_payload_size);
    for (_, bytes) in cluster.network.published(CONSENSUS_TOPIC) {
        let msg = decode_message(&deserializer, &bytes).unwrap();
        follower.receive_message(msg).unwrap();
    }

    let (done, elapsed) = waiter.join().unwrap();
    assert!(done);
    // the block deadline is almost 5s away
    assert!(elapsed < Duration::from_secs(3));
    assert!(follower.state.read().is_finished(SubroundId::BLOCK));
}
