// Copyright (c) 2022 MASSA LABS <info@massa.net>

use super::tools::test_config;
use crate::start_ntp_sync_timer;
use serial_test::serial;
use spos_consensus_exports::{ConsensusConfig, ConsensusVariant};
use spos_test_framework::wait_until;
use spos_time::{SposTime, SyncTimer};
use std::net::UdpSocket;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const NTP_UNIX_EPOCH_DELTA: u64 = 2_208_988_800;

/// SNTP server on localhost answering with a clock `ahead_millis` ahead of the local one.
/// It stops after 300ms without any request and returns how many requests it answered.
fn fake_sntp_server(ahead_millis: u64) -> (String, JoinHandle<usize>) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    let addr = socket.local_addr().unwrap().to_string();
    let server = thread::spawn(move || {
        let mut answered = 0;
        let mut request = [0u8; 48];
        while let Ok((_, from)) = socket.recv_from(&mut request) {
            let ms = SposTime::now().to_millis() + ahead_millis;
            let secs = (ms / 1000 + NTP_UNIX_EPOCH_DELTA) as u32;
            let frac = (((ms % 1000) << 32) / 1000) as u32;
            let mut reply = [0u8; 48];
            // LI 0, version 4, server mode
            reply[0] = 0x24;
            // receive and transmit timestamps
            for at in [32, 40] {
                reply[at..at + 4].copy_from_slice(&secs.to_be_bytes());
                reply[at + 4..at + 8].copy_from_slice(&frac.to_be_bytes());
            }
            socket.send_to(&reply, from).unwrap();
            answered += 1;
        }
        answered
    });
    (addr, server)
}

#[test]
#[serial]
fn test_clock_follows_the_configured_ntp_server() {
    let (addr, server) = fake_sntp_server(5000);
    let cfg = ConsensusConfig {
        ntp_hosts: vec![addr],
        ntp_refresh_period: SposTime::from_millis(50),
        ntp_query_timeout: SposTime::from_millis(500),
        ..test_config(ConsensusVariant::Bls, 1)
    };
    let (timer, handle) = start_ntp_sync_timer(&cfg).unwrap();
    assert!(wait_until(
        Duration::from_secs(5),
        Duration::from_millis(10),
        || (4800..5200).contains(&timer.clock_offset())
    ));
    let local = SposTime::now().to_millis();
    let synced = timer.current_time().to_millis();
    assert!(synced >= local + 4800, "{} vs {}", synced, local);

    handle.stop();
    // the refresh thread queried the server more than once
    assert!(server.join().unwrap() >= 2);
}

#[test]
#[serial]
fn test_clock_without_reachable_server_stays_local() {
    // nothing listens on this port once the socket is dropped
    let addr = {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap().to_string()
    };
    let cfg = ConsensusConfig {
        ntp_hosts: vec![addr],
        ntp_refresh_period: SposTime::from_millis(50),
        ntp_query_timeout: SposTime::from_millis(100),
        ..test_config(ConsensusVariant::Bls, 1)
    };
    let (timer, handle) = start_ntp_sync_timer(&cfg).unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(timer.clock_offset(), 0);
    handle.stop();

    let (timer, handle) = start_ntp_sync_timer(&ConsensusConfig {
        ntp_hosts: Vec::new(),
        ..cfg
    })
    .unwrap();
    assert_eq!(timer.clock_offset(), 0);
    handle.stop();
}
