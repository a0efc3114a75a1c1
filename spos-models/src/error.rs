// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use thiserror::Error;

/// Result of a models operation
pub type ModelsResult<T, E = ModelsError> = core::result::Result<T, E>;

/// Models error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ModelsError {
    /// Serialization error: {0}
    SerializeError(String),
    /// Deserialization error: {0}
    DeserializeError(String),
    /// spos_hash error: {0}
    HashError(#[from] spos_hash::HashError),
    /// signature error: {0}
    SignatureError(#[from] spos_signature::SposSignatureError),
    /// Time error {0}
    TimeError(#[from] spos_time::TimeError),
    /// invalid message type id: {0}
    InvalidMessageType(u32),
    /// checked operation error: {0}
    CheckedOperationError(String),
}

impl From<spos_serialization::SerializeError> for ModelsError {
    fn from(err: spos_serialization::SerializeError) -> Self {
        ModelsError::SerializeError(err.to_string())
    }
}
