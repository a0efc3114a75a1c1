// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use thiserror::Error;

/// signature and multi-signature errors
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone, PartialEq, Eq)]
pub enum SposSignatureError {
    /// parsing error : {0}
    ParsingError(String),
    /// signature error: {0}
    SignatureError(String),
    /// multi-signature error: {0}
    MultiSignatureError(String),
    /// index {0} is out of the signer group
    InvalidIndex(usize),
    /// bit {0} is set in the bitmap but no signature share was received for it
    NilSignature(usize),
    /// signature share of index {0} does not verify
    InvalidShare(usize),
    /// no commitment stored for index {0}
    MissingCommitment(usize),
}
