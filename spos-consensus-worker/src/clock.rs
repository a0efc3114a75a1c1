// Copyright (c) 2022 MASSA LABS <info@massa.net>

use spos_consensus_exports::error::ConsensusResult;
use spos_consensus_exports::ConsensusConfig;
use spos_time::{NtpSyncHandle, NtpSyncTimer, SntpQuery};
use std::sync::Arc;
use tracing::{info, warn};

/// Starts the clock of a node, synchronized on the NTP servers of `config`.
///
/// The offset is queried right away, then every `ntp_refresh_period`. Without any reachable
/// server the clock stays on the local time.
///
/// # Returns
/// The clock, to be handed to the consensus through `ConsensusChannels::sync_timer`, and the
/// handle stopping its refresh thread
pub fn start_ntp_sync_timer(
    config: &ConsensusConfig,
) -> ConsensusResult<(Arc<NtpSyncTimer>, NtpSyncHandle)> {
    if config.ntp_hosts.is_empty() {
        warn!("no NTP server configured, the consensus clock follows the local clock");
    }
    let query = SntpQuery::new(config.ntp_hosts.clone(), config.ntp_query_timeout);
    let timer = Arc::new(NtpSyncTimer::new(
        Arc::new(query),
        config.ntp_refresh_period,
    ));
    let handle = timer.start_sync()?;
    info!(
        "clock synchronized on {} NTP servers every {}ms",
        config.ntp_hosts.len(),
        config.ntp_refresh_period.to_millis()
    );
    Ok((timer, handle))
}
