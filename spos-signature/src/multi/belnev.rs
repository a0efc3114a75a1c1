// Copyright (c) 2022 MASSA LABS <info@massa.net>

use super::{Bitmap, MultiSigner};
use crate::{KeyPair, PublicKey, SposSignatureError};
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};
use spos_hash::Hash;

const CHALLENGE_DOMAIN: &[u8] = b"spos-belnev-challenge";
const POINT_SIZE: usize = 32;
const SCALAR_SIZE: usize = 32;

/// Bellare–Neven multi-signature over edwards25519, reusing the ed25519 keys of the group.
///
/// Member `i` with key `x_i` (public `X_i`) commits to `R_i = r_i·B`, the selected set `L`
/// agrees on `R = Σ R_i`, and each member answers with `s_i = r_i + c_i·x_i` where
/// `c_i = H(L ‖ X_i ‖ R ‖ m)`. The aggregate is `R ‖ Σ s_i` and verifies with
/// `s·B == R + Σ c_i·X_i`.
pub struct BelNevMultiSigner {
    secret: Scalar,
    pub_keys: Vec<PublicKey>,
    points: Vec<EdwardsPoint>,
    own_index: usize,
    message: Vec<u8>,
    commitment_secret: Option<Scalar>,
    commitment_hashes: Vec<Option<Hash>>,
    commitments: Vec<Option<EdwardsPoint>>,
    shares: Vec<Option<Scalar>>,
}

/// ed25519 secret scalar: clamped lower half of SHA-512(seed)
fn secret_scalar(keypair: &KeyPair) -> Scalar {
    let digest = Sha512::digest(keypair.to_bytes());
    let mut bytes = [0u8; SCALAR_SIZE];
    bytes.copy_from_slice(&digest.as_slice()[..SCALAR_SIZE]);
    bytes[0] &= 248;
    bytes[31] &= 127;
    bytes[31] |= 64;
    Scalar::from_bytes_mod_order(bytes)
}

fn decode_point(bytes: &[u8]) -> Option<EdwardsPoint> {
    let raw: [u8; POINT_SIZE] = bytes.try_into().ok()?;
    CompressedEdwardsY(raw).decompress()
}

fn decode_scalar(bytes: &[u8]) -> Option<Scalar> {
    let raw: [u8; SCALAR_SIZE] = bytes.try_into().ok()?;
    Option::from(Scalar::from_canonical_bytes(raw))
}

impl BelNevMultiSigner {
    /// Creates a signer holding `keypair`. Call `reset` before use.
    pub fn new(keypair: &KeyPair) -> Self {
        BelNevMultiSigner {
            secret: secret_scalar(keypair),
            pub_keys: Vec::new(),
            points: Vec::new(),
            own_index: 0,
            message: Vec::new(),
            commitment_secret: None,
            commitment_hashes: Vec::new(),
            commitments: Vec::new(),
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

    fn aggregated_commitment(&self, bitmap: &Bitmap) -> Result<EdwardsPoint, SposSignatureError> {
        let mut selected = bitmap.selected(self.pub_keys.len()).peekable();
        if selected.peek().is_none() {
            return Err(SposSignatureError::MultiSignatureError(
                "bitmap selects no signer".into(),
            ));
        }
        selected
            .map(|i| self.commitments[i].ok_or(SposSignatureError::MissingCommitment(i)))
            .sum()
    }

    fn challenge(&self, index: usize, bitmap: &Bitmap, aggregated: &EdwardsPoint) -> Scalar {
        let mut hasher = Sha512::new();
        hasher.update(CHALLENGE_DOMAIN);
        for i in bitmap.selected(self.pub_keys.len()) {
            hasher.update(self.pub_keys[i].to_bytes());
        }
        hasher.update(self.pub_keys[index].to_bytes());
        hasher.update(aggregated.compress().as_bytes());
        hasher.update(&self.message);
        let mut wide = [0u8; 64];
        wide.copy_from_slice(hasher.finalize().as_slice());
        Scalar::from_bytes_mod_order_wide(&wide)
    }
}

impl MultiSigner for BelNevMultiSigner {
    fn reset(
        &mut self,
        pub_keys: &[PublicKey],
        own_index: usize,
    ) -> Result<(), SposSignatureError> {
        if own_index >= pub_keys.len() {
            return Err(SposSignatureError::InvalidIndex(own_index));
        }
        let points = pub_keys
            .iter()
            .map(|key| {
                decode_point(key.to_bytes()).ok_or_else(|| {
                    SposSignatureError::MultiSignatureError(format!(
                        "public key {} is not a curve point",
                        key
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let n = pub_keys.len();
        self.pub_keys = pub_keys.to_vec();
        self.points = points;
        self.own_index = own_index;
        self.message.clear();
        self.commitment_secret = None;
        self.commitment_hashes = vec![None; n];
        self.commitments = vec![None; n];
        self.shares = vec![None; n];
        Ok(())
    }

    fn set_message(&mut self, message: &[u8]) {
        self.message = message.to_vec();
    }

    fn create_commitment(&mut self) -> Result<(Vec<u8>, Vec<u8>), SposSignatureError> {
        self.check_index(self.own_index)?;
        let mut wide = [0u8; 64];
        OsRng.fill_bytes(&mut wide);
        let secret = Scalar::from_bytes_mod_order_wide(&wide);
        let public = EdwardsPoint::mul_base(&secret);
        self.commitment_secret = Some(secret);
        self.commitments[self.own_index] = Some(public);
        Ok((
            secret.to_bytes().to_vec(),
            public.compress().to_bytes().to_vec(),
        ))
    }

    fn store_commitment_hash(
        &mut self,
        index: usize,
        hash: Hash,
    ) -> Result<(), SposSignatureError> {
        self.check_index(index)?;
        self.commitment_hashes[index] = Some(hash);
        Ok(())
    }

    fn commitment_hash(&self, index: usize) -> Result<Hash, SposSignatureError> {
        self.check_index(index)?;
        self.commitment_hashes[index].ok_or(SposSignatureError::MissingCommitment(index))
    }

    fn store_commitment(
        &mut self,
        index: usize,
        commitment: &[u8],
    ) -> Result<(), SposSignatureError> {
        self.check_index(index)?;
        let point = decode_point(commitment).ok_or_else(|| {
            SposSignatureError::MultiSignatureError(format!(
                "commitment of index {} is not a curve point",
                index
            ))
        })?;
        self.commitments[index] = Some(point);
        Ok(())
    }

    fn commitment(&self, index: usize) -> Result<Vec<u8>, SposSignatureError> {
        self.check_index(index)?;
        self.commitments[index]
            .map(|point| point.compress().to_bytes().to_vec())
            .ok_or(SposSignatureError::MissingCommitment(index))
    }

    fn aggregate_commitments(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, SposSignatureError> {
        Ok(self
            .aggregated_commitment(bitmap)?
            .compress()
            .to_bytes()
            .to_vec())
    }

    fn create_signature_share(&mut self, bitmap: &Bitmap) -> Result<Vec<u8>, SposSignatureError> {
        if !bitmap.is_set(self.own_index) {
            return Err(SposSignatureError::MultiSignatureError(
                "own index is not selected by the bitmap".into(),
            ));
        }
        let secret = self
            .commitment_secret
            .ok_or(SposSignatureError::MissingCommitment(self.own_index))?;
        let aggregated = self.aggregated_commitment(bitmap)?;
        let challenge = self.challenge(self.own_index, bitmap, &aggregated);
        let share = secret + challenge * self.secret;
        self.shares[self.own_index] = Some(share);
        Ok(share.to_bytes().to_vec())
    }

    fn verify_signature_share(
        &self,
        index: usize,
        share: &[u8],
        bitmap: &Bitmap,
    ) -> Result<(), SposSignatureError> {
        self.check_index(index)?;
        if !bitmap.is_set(index) {
            return Err(SposSignatureError::MultiSignatureError(format!(
                "index {} is not selected by the bitmap",
                index
            )));
        }
        let share = decode_scalar(share).ok_or(SposSignatureError::InvalidShare(index))?;
        let commitment = self.commitments[index].ok_or(SposSignatureError::MissingCommitment(index))?;
        let aggregated = self.aggregated_commitment(bitmap)?;
        let challenge = self.challenge(index, bitmap, &aggregated);
        if EdwardsPoint::mul_base(&share) == commitment + challenge * self.points[index] {
            Ok(())
        } else {
            Err(SposSignatureError::InvalidShare(index))
        }
    }

    fn store_signature_share(
        &mut self,
        index: usize,
        share: &[u8],
    ) -> Result<(), SposSignatureError> {
        self.check_index(index)?;
        let share = decode_scalar(share).ok_or(SposSignatureError::InvalidShare(index))?;
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
        let aggregated = self.aggregated_commitment(bitmap)?;
        let sum: Scalar = bitmap
            .selected(self.pub_keys.len())
            .map(|i| self.shares[i].ok_or(SposSignatureError::NilSignature(i)))
            .sum::<Result<Scalar, _>>()?;
        let mut signature = aggregated.compress().to_bytes().to_vec();
        signature.extend_from_slice(sum.as_bytes());
        Ok(signature)
    }

    fn verify(&self, signature: &[u8], bitmap: &Bitmap) -> Result<(), SposSignatureError> {
        if signature.len() != POINT_SIZE + SCALAR_SIZE {
            return Err(SposSignatureError::SignatureError(format!(
                "aggregated signature must be {} bytes, got {}",
                POINT_SIZE + SCALAR_SIZE,
                signature.len()
            )));
        }
        let aggregated = decode_point(&signature[..POINT_SIZE]).ok_or_else(|| {
            SposSignatureError::SignatureError("invalid aggregated commitment".into())
        })?;
        let sum = decode_scalar(&signature[POINT_SIZE..])
            .ok_or_else(|| SposSignatureError::SignatureError("invalid aggregated scalar".into()))?;
        let selected: Vec<usize> = bitmap.selected(self.pub_keys.len()).collect();
        if selected.is_empty() {
            return Err(SposSignatureError::MultiSignatureError(
                "bitmap selects no signer".into(),
            ));
        }
        let expected: EdwardsPoint = aggregated
            + selected
                .iter()
                .map(|i| self.challenge(*i, bitmap, &aggregated) * self.points[*i])
                .sum::<EdwardsPoint>();
        if EdwardsPoint::mul_base(&sum) == expected {
            Ok(())
        } else {
            Err(SposSignatureError::SignatureError(
                "aggregated signature does not verify".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_scalar_matches_public_key() {
        let keypair = KeyPair::generate();
        let point = EdwardsPoint::mul_base(&secret_scalar(&keypair));
        assert_eq!(
            point.compress().to_bytes(),
            *keypair.get_public_key().to_bytes()
        );
    }

    #[test]
    fn test_reset_rejects_index_outside_group() {
        let keypair = KeyPair::generate();
        let mut signer = BelNevMultiSigner::new(&keypair);
        assert_eq!(
            signer.reset(&[keypair.get_public_key()], 1),
            Err(SposSignatureError::InvalidIndex(1))
        );
    }
}
