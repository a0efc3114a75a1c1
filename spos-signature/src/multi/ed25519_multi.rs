// Copyright (c) 2022 MASSA LABS <info@massa.net>

use super::{Bitmap, MultiSigner};
use crate::{KeyPair, PublicKey, Signature, SposSignatureError, SIGNATURE_SIZE_BYTES};
use spos_hash::Hash;

/// Single-round multi-signer for the Block / Signature / EndRound schedule.
///
/// Each share is a plain ed25519 signature of the message. The aggregate is the
/// concatenation of the shares of the selected members, in group order, so it needs no
/// commitment phase.
pub struct Ed25519MultiSigner {
    keypair: KeyPair,
    pub_keys: Vec<PublicKey>,
    own_index: usize,
    message: Vec<u8>,
    shares: Vec<Option<Signature>>,
}

impl Ed25519MultiSigner {
    /// Creates a signer holding `keypair`. Call `reset` before use.
    pub fn new(keypair: &KeyPair) -> Self {
        Ed25519MultiSigner {
            keypair: keypair.clone(),
            pub_keys: Vec::new(),
            own_index: 0,
            message: Vec::new(),
            shares: Vec::new(),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), SposSignatureError> {
        if index < self.pub_keys.len() {
            Ok(())
        } else {
            Err(SposSignatureError::InvalidIndex(index))
        }
    }

    fn no_commitment<T>() -> Result<T, SposSignatureError> {
        Err(SposSignatureError::MultiSignatureError(
            "this scheme has no commitment phase".into(),
        ))
    }
}

impl MultiSigner for Ed25519MultiSigner {
    fn reset(
        &mut self,
        pub_keys: &[PublicKey],
        own_index: usize,
    ) -> Result<(), SposSignatureError> {
        if own_index >= pub_keys.len() {
            return Err(SposSignatureError::InvalidIndex(own_index));
        }
        self.pub_keys = pub_keys.to_vec();
        self.own_index = own_index;
        self.message.clear();
        self.shares = vec![None; pub_keys.len()];
        Ok(())
    }

    fn set_message(&mut self, message: &[u8]) {
        self.message = message.to_vec();
    }

    fn create_commitment(&mut self) -> Result<(Vec<u8>, Vec<u8>), SposSignatureError> {
        Self::no_commitment()
    }

    fn store_commitment_hash(
        &mut self,
        _index: usize,
        _hash: Hash,
    ) -> Result<(), SposSignatureError> {
        Self::no_commitment()
    }

    fn commitment_hash(&self, _index: usize) -> Result<Hash, SposSignatureError> {
        Self::no_commitment()
    }

    fn store_commitment(
        &mut self,
        _index: usize,
        _commitment: &[u8],
    ) -> Result<(), SposSignatureError> {
        Self::no_commitment()
    }

    fn commitment(&self, _index: usize) -> Result<Vec<u8>, SposSignatureError> {
        Self::no_commitment()
    }

    fn aggregate_commitments(&mut self, _bitmap: &Bitmap) -> Result<Vec<u8>, SposSignatureError> {
        Self::no_commitment()
    }

    fn create_signature_share(&mut self, _bitmap: &Bitmap) -> Result<Vec<u8>, SposSignatureError> {
        self.check_index(self.own_index)?;
        let share = self.keypair.sign_bytes(&self.message);
        self.shares[self.own_index] = Some(share);
        Ok(share.to_bytes().to_vec())
    }

    fn verify_signature_share(
        &self,
        index: usize,
        share: &[u8],
        _bitmap: &Bitmap,
    ) -> Result<(), SposSignatureError> {
        self.check_index(index)?;
        let share = Signature::from_slice(share).map_err(|_| SposSignatureError::InvalidShare(index))?;
        self.pub_keys[index]
            .verify_bytes(&self.message, &share)
            .map_err(|_| SposSignatureError::InvalidShare(index))
    }

    fn store_signature_share(
        &mut self,
        index: usize,
        share: &[u8],
    ) -> Result<(), SposSignatureError> {
        self.check_index(index)?;
        let share = Signature::from_slice(share).map_err(|_| SposSignatureError::InvalidShare(index))?;
        self.shares[index] = Some(share);
        Ok(())
    }

    fn signature_share(&self, index: usize) -> Result<Vec<u8>, SposSignatureError> {
        self.check_index(index)?;
        self.shares[index]
            .map(|share| share.to_bytes().to_vec())
            .ok_or(SposSignatureError::NilSignature(index))
    }

    fn aggregate_sigs(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, SposSignatureError> {
        let mut aggregated = Vec::new();
        for i in bitmap.selected(self.pub_keys.len()) {
            let share = self.shares[i].ok_or(SposSignatureError::NilSignature(i))?;
            aggregated.extend_from_slice(&share.to_bytes());
        }
        if aggregated.is_empty() {
            return Err(SposSignatureError::MultiSignatureError(
                "bitmap selects no signer".into(),
            ));
        }
        Ok(aggregated)
    }

    fn verify(&self, signature: &[u8], bitmap: &Bitmap) -> Result<(), SposSignatureError> {
        let selected: Vec<usize> = bitmap.selected(self.pub_keys.len()).collect();
        if selected.is_empty() || signature.len() != selected.len() * SIGNATURE_SIZE_BYTES {
            return Err(SposSignatureError::SignatureError(format!(
                "expected {} concatenated signatures in {} bytes",
                selected.len(),
                signature.len()
            )));
        }
        for (i, chunk) in selected
            .iter()
            .zip(signature.chunks_exact(SIGNATURE_SIZE_BYTES))
        {
            let share = Signature::from_slice(chunk)?;
            self.pub_keys[*i]
                .verify_bytes(&self.message, &share)
                .map_err(|_| SposSignatureError::InvalidShare(*i))?;
        }
        Ok(())
    }
}
