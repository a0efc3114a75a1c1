// Copyright (c) 2022 MASSA LABS <info@massa.net>
use displaydoc::Display;
use spos_models::error::ModelsError;
use spos_signature::SposSignatureError;
use spos_time::TimeError;
use thiserror::Error;

/// Result of a consensus operation
pub type ConsensusResult<T, E = ConsensusError> = core::result::Result<T, E>;

/// Consensus error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ConsensusError {
    /// invalid envelope: {0}
    InvalidEnvelope(String),
    /// duplicate contribution: {0}
    DuplicateContribution(String),
    /// precondition unmet: {0}
    PreconditionUnmet(String),
    /// subround hook failed: {0}
    HookFailure(String),
    /// deadline exceeded: {0}
    DeadlineExceeded(String),
    /// cryptographic failure: {0}
    CryptoFailure(String),
    /// block commit failed: {0}
    CommitFailure(String),
    /// bit {0} is set in the bitmap but its signature share is missing
    NilSignature(usize),
    /// commitment of index {0} does not match its announced hash
    CommitmentHashDoesNotMatch(usize),
    /// invalid bitmap: {0}
    InvalidBitmap(String),
    /// block processor error: {0}
    ProcessorError(String),
    /// messenger error: {0}
    MessengerError(String),
    /// configuration error: {0}
    ConfigError(String),
    /// channel error: {0}
    ChannelError(String),
    /// models error: {0}
    ModelsError(#[from] ModelsError),
    /// time error: {0}
    TimeError(#[from] TimeError),
}

impl From<SposSignatureError> for ConsensusError {
    fn from(err: SposSignatureError) -> Self {
        match err {
            SposSignatureError::NilSignature(index) => ConsensusError::NilSignature(index),
            other => ConsensusError::CryptoFailure(other.to_string()),
        }
    }
}

impl ConsensusError {
    /// True when the message should stay queued until a later status change
    pub fn is_precondition_unmet(&self) -> bool {
        matches!(self, ConsensusError::PreconditionUnmet(_))
    }
}
