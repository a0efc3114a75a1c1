// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::{SposTime, TimeError, TimeQuery};
use std::net::UdpSocket;
use std::time::Duration;
use tracing::debug;

const NTP_PACKET_SIZE: usize = 48;
/// LI = 0, VN = 4, Mode = 3 (client)
const NTP_CLIENT_HEADER: u8 = 0x23;
/// seconds between 1900-01-01 and 1970-01-01
const NTP_UNIX_EPOCH_DELTA: u64 = 2_208_988_800;

/// Minimal SNTP client (RFC 4330) asking a list of servers in order until one answers
pub struct SntpQuery {
    hosts: Vec<String>,
    timeout: Duration,
}

impl SntpQuery {
    /// `hosts` are `host:port` strings, usually on port 123
    pub fn new(hosts: Vec<String>, timeout: SposTime) -> Self {
        SntpQuery {
            hosts,
            timeout: timeout.to_duration(),
        }
    }

    fn query_host(&self, host: &str) -> Result<i64, TimeError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|err| TimeError::TimeSourceError(err.to_string()))?;
        socket
            .set_read_timeout(Some(self.timeout))
            .map_err(|err| TimeError::TimeSourceError(err.to_string()))?;
        let mut request = [0u8; NTP_PACKET_SIZE];
        request[0] = NTP_CLIENT_HEADER;
        let originate = SposTime::now();
        socket
            .send_to(&request, host)
            .map_err(|err| TimeError::TimeSourceError(format!("{}: {}", host, err)))?;
        let mut response = [0u8; NTP_PACKET_SIZE];
        let (len, _) = socket
            .recv_from(&mut response)
            .map_err(|err| TimeError::TimeSourceError(format!("{}: {}", host, err)))?;
        let destination = SposTime::now();
        if len < NTP_PACKET_SIZE {
            return Err(TimeError::TimeSourceError(format!(
                "{}: short answer of {} bytes",
                host, len
            )));
        }
        compute_offset(&response, originate, destination)
    }
}

impl TimeQuery for SntpQuery {
    fn query_offset(&self) -> Result<i64, TimeError> {
        let mut last_error = TimeError::TimeSourceError("no time server configured".into());
        for host in &self.hosts {
            match self.query_host(host) {
                Ok(offset) => return Ok(offset),
                Err(err) => {
                    debug!("sntp query failed: {}", err);
                    last_error = err;
                }
            }
        }
        Err(last_error)
    }
}

/// Reads a 64-bit NTP timestamp (32.32 fixed point since 1900) as unix milliseconds
fn read_timestamp(packet: &[u8; NTP_PACKET_SIZE], at: usize) -> Result<SposTime, TimeError> {
    let mut secs = [0u8; 4];
    let mut frac = [0u8; 4];
    secs.copy_from_slice(&packet[at..at + 4]);
    frac.copy_from_slice(&packet[at + 4..at + 8]);
    let secs = u64::from(u32::from_be_bytes(secs));
    let frac = u64::from(u32::from_be_bytes(frac));
    let unix_secs = secs
        .checked_sub(NTP_UNIX_EPOCH_DELTA)
        .ok_or(TimeError::TimeOverflowError)?;
    Ok(SposTime::from_millis(
        unix_secs * 1000 + ((frac * 1000) >> 32),
    ))
}

/// Clock offset `((t2 - t1) + (t3 - t4)) / 2` where t1/t4 are the local send/receive
/// times and t2/t3 the server receive/transmit times
pub(crate) fn compute_offset(
    packet: &[u8; NTP_PACKET_SIZE],
    originate: SposTime,
    destination: SposTime,
) -> Result<i64, TimeError> {
    let receive = read_timestamp(packet, 32)?;
    let transmit = read_timestamp(packet, 40)?;
    let offset = (receive.signed_diff(originate) / 2) + (transmit.signed_diff(destination) / 2);
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_with(receive_ms: u64, transmit_ms: u64) -> [u8; NTP_PACKET_SIZE] {
        let mut packet = [0u8; NTP_PACKET_SIZE];
        for (at, ms) in [(32usize, receive_ms), (40usize, transmit_ms)] {
            let secs = (ms / 1000 + NTP_UNIX_EPOCH_DELTA) as u32;
            let frac = (((ms % 1000) << 32) / 1000) as u32;
            packet[at..at + 4].copy_from_slice(&secs.to_be_bytes());
            packet[at + 4..at + 8].copy_from_slice(&frac.to_be_bytes());
        }
        packet
    }

    #[test]
    fn test_offset_of_a_clock_behind_by_300ms() {
        // local sends at 10_000, server says 10_310 / 10_320, local receives at 10_030
        let packet = packet_with(1_600_000_010_310, 1_600_000_010_320);
        let offset = compute_offset(
            &packet,
            SposTime::from_millis(1_600_000_010_000),
            SposTime::from_millis(1_600_000_010_030),
        )
        .unwrap();
        assert!((297..=301).contains(&offset), "offset {}", offset);
    }

    #[test]
    fn test_timestamp_before_unix_epoch_is_rejected() {
        let packet = [0u8; NTP_PACKET_SIZE];
        assert!(compute_offset(&packet, SposTime::from_millis(0), SposTime::from_millis(0)).is_err());
    }

    #[test]
    fn test_no_host_is_an_error() {
        let query = SntpQuery::new(vec![], SposTime::from_millis(10));
        assert!(query.query_offset().is_err());
    }
}
