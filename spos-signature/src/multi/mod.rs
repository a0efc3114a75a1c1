// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Multi-signature schemes used to seal a block with the signatures of the consensus group.
//!
//! A signer is reset at the beginning of every round with the ordered group and its own
//! position in it. Shares, commitments and commitment hashes are then stored by group index.
//! A `Bitmap` selects which members take part in the aggregate.

mod belnev;
mod bitmap;
mod ed25519_multi;

pub use belnev::BelNevMultiSigner;
pub use bitmap::Bitmap;
pub use ed25519_multi::Ed25519MultiSigner;

use crate::{PublicKey, SposSignatureError};
use spos_hash::Hash;

/// Per-round multi-signature accumulator
pub trait MultiSigner: Send {
    /// Starts a new session for the ordered `pub_keys`, this node being `own_index`.
    /// Clears every stored commitment and share.
    fn reset(&mut self, pub_keys: &[PublicKey], own_index: usize)
        -> Result<(), SposSignatureError>;

    /// Sets the message all shares sign
    fn set_message(&mut self, message: &[u8]);

    /// Creates this node's commitment and stores it at its own index.
    /// Returns `(secret, public)`.
    fn create_commitment(&mut self) -> Result<(Vec<u8>, Vec<u8>), SposSignatureError>;

    /// Stores the hash of the commitment announced by member `index`
    fn store_commitment_hash(&mut self, index: usize, hash: Hash)
        -> Result<(), SposSignatureError>;

    /// Hash of the commitment announced by member `index`
    fn commitment_hash(&self, index: usize) -> Result<Hash, SposSignatureError>;

    /// Stores the public commitment revealed by member `index`
    fn store_commitment(&mut self, index: usize, commitment: &[u8])
        -> Result<(), SposSignatureError>;

    /// Public commitment of member `index`
    fn commitment(&self, index: usize) -> Result<Vec<u8>, SposSignatureError>;

    /// Combines the commitments of the members selected by `bitmap`
    fn aggregate_commitments(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, SposSignatureError>;

    /// Creates this node's share for the members selected by `bitmap` and stores it
    fn create_signature_share(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, SposSignatureError>;

    /// Checks the share of member `index` against the session message and `bitmap`
    fn verify_signature_share(
        &self,
        index: usize,
        share: &[u8],
        bitmap: &Bitmap,
    ) -> Result<(), SposSignatureError>;

    /// Stores the share of member `index`
    fn store_signature_share(&mut self, index: usize, share: &[u8])
        -> Result<(), SposSignatureError>;

    /// Share stored for member `index`
    fn signature_share(&self, index: usize) -> Result<Vec<u8>, SposSignatureError>;

    /// Aggregates the shares of every member selected by `bitmap`.
    /// Fails with `NilSignature` if one of them is missing.
    fn aggregate_sigs(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, SposSignatureError>;

    /// Verifies an aggregated signature of the members selected by `bitmap`
    fn verify(&self, signature: &[u8], bitmap: &Bitmap) -> Result<(), SposSignatureError>;
}
