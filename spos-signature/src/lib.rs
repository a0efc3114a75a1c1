// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Signature management: single ed25519 signatures for message envelopes and
//! multi-signatures sealing a block with the consensus group.

#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]
mod error;
pub mod multi;
mod signature_impl;

#[cfg(test)]
mod tests;

pub use error::SposSignatureError;
pub use multi::{BelNevMultiSigner, Bitmap, Ed25519MultiSigner, MultiSigner};
pub use signature_impl::{
    KeyPair, PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature,
    SignatureDeserializer, SignatureSerializer, KEYPAIR_SIZE_BYTES, PUBLIC_KEY_SIZE_BYTES,
    SIGNATURE_SIZE_BYTES,
};
