// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! User-facing consensus settings
//!
//! * settings: read from a user configuration file
//! * config: merge of the settings and the hard-coded protocol values from
//!   `spos_models::config`, see `ConsensusConfig`

use crate::error::{ConsensusError, ConsensusResult};
use serde::{Deserialize, Serialize};
use spos_models::config::{
    CHRONOLOGY_QUANTUM_MILLIS, NTP_REFRESH_PERIOD_MILLIS, PROCESSING_THRESHOLD_PERCENT,
};
use spos_time::SposTime;
use std::path::Path;

/// Signature scheme and matching subround schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusVariant {
    /// CommitmentHash, Bitmap and Commitment phases before the signature
    BellareNeven,
    /// Block, Signature and EndRound only
    Bls,
}

fn default_chronology_quantum() -> SposTime {
    SposTime::from_millis(CHRONOLOGY_QUANTUM_MILLIS)
}

fn default_processing_threshold_percent() -> u8 {
    PROCESSING_THRESHOLD_PERCENT
}

fn default_ntp_refresh_period() -> SposTime {
    SposTime::from_millis(NTP_REFRESH_PERIOD_MILLIS)
}

/// Consensus settings, as written by the node operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusSettings {
    /// start of round 0, unix millis
    pub genesis_timestamp: SposTime,
    /// round duration in millis
    pub round_duration: SposTime,
    /// signature scheme
    pub variant: ConsensusVariant,
    /// pace subrounds on the wall clock instead of on completed work
    #[serde(default)]
    pub sync_mode: bool,
    /// shard of the node
    pub shard_id: u32,
    /// number of validators drawn for each round
    pub consensus_group_size: usize,
    /// sleep between two chronology iterations
    #[serde(default = "default_chronology_quantum")]
    pub chronology_quantum: SposTime,
    /// share of the round after which block processing must stop, in percent
    #[serde(default = "default_processing_threshold_percent")]
    pub processing_threshold_percent: u8,
    /// NTP servers, `host:port`
    #[serde(default)]
    pub ntp_hosts: Vec<String>,
    /// period of the clock offset refresh
    #[serde(default = "default_ntp_refresh_period")]
    pub ntp_refresh_period: SposTime,
}

impl ConsensusSettings {
    /// Reads settings from a TOML string
    pub fn from_toml_str(content: &str) -> ConsensusResult<Self> {
        config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|err| ConsensusError::ConfigError(err.to_string()))
    }

    /// Reads settings from a file, then lets `SPOS_CONSENSUS_*` environment variables override them
    pub fn from_file(path: &Path) -> ConsensusResult<Self> {
        config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("SPOS_CONSENSUS"))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|err| ConsensusError::ConfigError(err.to_string()))
    }
}
