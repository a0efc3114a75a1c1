// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::SposSignatureError;
use ed25519_dalek::{Signer, Verifier};
use nom::{
    bytes::complete::take,
    error::{context, ContextError, ErrorKind, ParseError},
    IResult,
};
use rand::rngs::OsRng;
use spos_hash::Hash;
use spos_serialization::{Deserializer, SerializeError, Serializer};
use std::{convert::TryInto, str::FromStr};

/// Size of a public key
pub const PUBLIC_KEY_SIZE_BYTES: usize = 32;
/// Size of a keypair
pub const KEYPAIR_SIZE_BYTES: usize = 32;
/// Size of a signature
pub const SIGNATURE_SIZE_BYTES: usize = 64;

/// `KeyPair` is used for signature and decrypting
#[derive(Clone)]
pub struct KeyPair(ed25519_dalek::SigningKey);

impl std::fmt::Display for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // never print the secret part
        write!(f, "KeyPair({})", self.get_public_key())
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for KeyPair {}

impl FromStr for KeyPair {
    type Err = SposSignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyPair::from_bs58_check(s)
    }
}

impl KeyPair {
    /// Generate a new `KeyPair`
    ///
    /// # Example
    ///  ```
    /// # use spos_signature::KeyPair;
    /// # use spos_hash::Hash;
    /// let keypair = KeyPair::generate();
    /// let data = Hash::compute_from("Hello World!".as_bytes());
    /// let signature = keypair.sign(&data).unwrap();
    /// assert!(keypair.get_public_key().verify_signature(&data, &signature).is_ok());
    /// ```
    pub fn generate() -> KeyPair {
        KeyPair(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    /// Returns the Signature produced by signing a hash with the secret key
    pub fn sign(&self, hash: &Hash) -> Result<Signature, SposSignatureError> {
        Ok(Signature(self.0.sign(hash.to_bytes())))
    }

    /// Signs arbitrary bytes
    pub fn sign_bytes(&self, data: &[u8]) -> Signature {
        Signature(self.0.sign(data))
    }

    /// Return the seed bytes of the keypair
    pub fn to_bytes(&self) -> [u8; KEYPAIR_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Convert a seed of size `KEYPAIR_SIZE_BYTES` to a `KeyPair`
    ///
    /// ```
    /// # use spos_signature::KeyPair;
    /// let keypair = KeyPair::generate();
    /// let keypair2 = KeyPair::from_bytes(&keypair.to_bytes()).unwrap();
    /// assert_eq!(keypair, keypair2);
    /// ```
    pub fn from_bytes(data: &[u8; KEYPAIR_SIZE_BYTES]) -> Result<Self, SposSignatureError> {
        Ok(KeyPair(ed25519_dalek::SigningKey::from_bytes(data)))
    }

    /// Get the public key of the keypair
    pub fn get_public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Encode a keypair into its base58 form
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Decode a base58 encoded keypair
    ///
    /// ```
    /// # use spos_signature::KeyPair;
    /// let keypair = KeyPair::generate();
    /// let bs58 = keypair.to_bs58_check();
    /// let keypair2 = KeyPair::from_bs58_check(&bs58).unwrap();
    /// assert_eq!(keypair.get_public_key(), keypair2.get_public_key());
    /// ```
    pub fn from_bs58_check(data: &str) -> Result<Self, SposSignatureError> {
        let bytes = bs58::decode(data)
            .with_check(None)
            .into_vec()
            .map_err(|err| {
                SposSignatureError::ParsingError(format!(
                    "keypair bs58_check parsing error: {}",
                    err
                ))
            })?;
        let seed: [u8; KEYPAIR_SIZE_BYTES] = bytes.as_slice().try_into().map_err(|_| {
            SposSignatureError::ParsingError(format!(
                "keypair must be {} bytes, got {}",
                KEYPAIR_SIZE_BYTES,
                bytes.len()
            ))
        })?;
        KeyPair::from_bytes(&seed)
    }
}

impl ::serde::Serialize for KeyPair {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&self.to_bs58_check())
    }
}

impl<'de> ::serde::Deserialize<'de> for KeyPair {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<KeyPair, D::Error> {
        struct Base58CheckVisitor;

        impl<'de> ::serde::de::Visitor<'de> for Base58CheckVisitor {
            type Value = KeyPair;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an ASCII base58check string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: ::serde::de::Error,
            {
                KeyPair::from_bs58_check(v).map_err(E::custom)
            }
        }
        d.deserialize_str(Base58CheckVisitor)
    }
}

/// Public key used to check if a message was signed
/// by the corresponding `KeyPair`.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_bytes().hash(state)
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl FromStr for PublicKey {
    type Err = SposSignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicKey::from_bs58_check(s)
    }
}

impl PublicKey {
    /// Checks if the `Signature` associated with a hash
    /// was produced with the `KeyPair` associated to given `PublicKey`
    pub fn verify_signature(
        &self,
        hash: &Hash,
        signature: &Signature,
    ) -> Result<(), SposSignatureError> {
        self.verify_bytes(hash.to_bytes(), signature)
    }

    /// Checks a signature over arbitrary bytes
    pub fn verify_bytes(&self, data: &[u8], signature: &Signature) -> Result<(), SposSignatureError> {
        self.0.verify(data, &signature.0).map_err(|err| {
            SposSignatureError::SignatureError(format!("signature verification failed: {}", err))
        })
    }

    /// Serialize a `PublicKey` using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a `PublicKey` as bytes.
    pub fn to_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE_BYTES] {
        self.0.as_bytes()
    }

    /// Deserialize a `PublicKey` using `bs58` encoding with checksum.
    pub fn from_bs58_check(data: &str) -> Result<PublicKey, SposSignatureError> {
        let bytes = bs58::decode(data)
            .with_check(None)
            .into_vec()
            .map_err(|err| {
                SposSignatureError::ParsingError(format!(
                    "public key bs58_check parsing error: {}",
                    err
                ))
            })?;
        let raw: [u8; PUBLIC_KEY_SIZE_BYTES] = bytes.as_slice().try_into().map_err(|_| {
            SposSignatureError::ParsingError(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_SIZE_BYTES,
                bytes.len()
            ))
        })?;
        PublicKey::from_bytes(&raw)
    }

    /// Deserialize a `PublicKey` from bytes. Fails if the bytes are not a curve point.
    pub fn from_bytes(data: &[u8; PUBLIC_KEY_SIZE_BYTES]) -> Result<PublicKey, SposSignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(data)
            .map(PublicKey)
            .map_err(|err| {
                SposSignatureError::ParsingError(format!("public key bytes parsing error: {}", err))
            })
    }
}

/// Serializer for `PublicKey`
#[derive(Clone, Copy, Default)]
pub struct PublicKeySerializer;

impl PublicKeySerializer {
    /// Creates a `PublicKeySerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<PublicKey> for PublicKeySerializer {
    fn serialize(&self, value: &PublicKey, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `PublicKey`
#[derive(Clone, Copy, Default)]
pub struct PublicKeyDeserializer;

impl PublicKeyDeserializer {
    /// Creates a `PublicKeyDeserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<PublicKey> for PublicKeyDeserializer {
    /// ```
    /// use spos_signature::{PublicKey, PublicKeyDeserializer, PublicKeySerializer, KeyPair};
    /// use spos_serialization::{DeserializeError, Deserializer, Serializer};
    ///
    /// let public_key = KeyPair::generate().get_public_key();
    /// let mut buffer = Vec::new();
    /// PublicKeySerializer::new().serialize(&public_key, &mut buffer).unwrap();
    /// let (rest, deser) = PublicKeyDeserializer::new().deserialize::<DeserializeError>(&buffer).unwrap();
    /// assert!(rest.is_empty());
    /// assert_eq!(public_key, deser);
    /// ```
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], PublicKey, E> {
        context("Failed PublicKey deserialization", |input: &'a [u8]| {
            let (rest, bytes) = take(PUBLIC_KEY_SIZE_BYTES)(input)?;
            let mut raw = [0u8; PUBLIC_KEY_SIZE_BYTES];
            raw.copy_from_slice(bytes);
            let key = PublicKey::from_bytes(&raw).map_err(|_| {
                nom::Err::Error(E::from_error_kind(input, ErrorKind::Fail))
            })?;
            Ok((rest, key))
        })(buffer)
    }
}

impl ::serde::Serialize for PublicKey {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_bs58_check())
        } else {
            s.serialize_bytes(self.to_bytes())
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for PublicKey {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<PublicKey, D::Error> {
        if d.is_human_readable() {
            struct Base58CheckVisitor;

            impl<'de> ::serde::de::Visitor<'de> for Base58CheckVisitor {
                type Value = PublicKey;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("an ASCII base58check string")
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    PublicKey::from_bs58_check(v).map_err(E::custom)
                }
            }
            d.deserialize_str(Base58CheckVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> ::serde::de::Visitor<'de> for BytesVisitor {
                type Value = PublicKey;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a bytestring")
                }

                fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    PublicKey::from_bytes(&v.try_into().map_err(E::custom)?).map_err(E::custom)
                }
            }

            d.deserialize_bytes(BytesVisitor)
        }
    }
}

/// Signature generated from a message and a `KeyPair`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Signature(ed25519_dalek::Signature);

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl FromStr for Signature {
    type Err = SposSignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::from_bs58_check(s)
    }
}

impl Signature {
    /// Serialize a `Signature` using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a Signature as bytes.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Deserialize a `Signature` using `bs58` encoding with checksum.
    pub fn from_bs58_check(data: &str) -> Result<Signature, SposSignatureError> {
        let bytes = bs58::decode(data)
            .with_check(None)
            .into_vec()
            .map_err(|err| {
                SposSignatureError::ParsingError(format!(
                    "signature bs58_check parsing error: {}",
                    err
                ))
            })?;
        Signature::from_slice(&bytes)
    }

    /// Deserialize a Signature from bytes.
    pub fn from_bytes(data: &[u8; SIGNATURE_SIZE_BYTES]) -> Signature {
        Signature(ed25519_dalek::Signature::from_bytes(data))
    }

    /// Deserialize a Signature from a slice, checking its length
    pub fn from_slice(data: &[u8]) -> Result<Signature, SposSignatureError> {
        let raw: [u8; SIGNATURE_SIZE_BYTES] = data.try_into().map_err(|_| {
            SposSignatureError::ParsingError(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_SIZE_BYTES,
                data.len()
            ))
        })?;
        Ok(Signature::from_bytes(&raw))
    }
}

impl ::serde::Serialize for Signature {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_bs58_check())
        } else {
            s.serialize_bytes(&self.to_bytes())
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for Signature {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<Signature, D::Error> {
        if d.is_human_readable() {
            struct Base58CheckVisitor;

            impl<'de> ::serde::de::Visitor<'de> for Base58CheckVisitor {
                type Value = Signature;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("an ASCII base58check string")
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Signature::from_bs58_check(v).map_err(E::custom)
                }
            }
            d.deserialize_str(Base58CheckVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> ::serde::de::Visitor<'de> for BytesVisitor {
                type Value = Signature;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a bytestring")
                }

                fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Signature::from_slice(v).map_err(E::custom)
                }
            }

            d.deserialize_bytes(BytesVisitor)
        }
    }
}

/// Serializer for `Signature`
#[derive(Clone, Copy, Default)]
pub struct SignatureSerializer;

impl SignatureSerializer {
    /// Creates a `SignatureSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<Signature> for SignatureSerializer {
    fn serialize(&self, value: &Signature, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(&value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `Signature`
#[derive(Clone, Copy, Default)]
pub struct SignatureDeserializer;

impl SignatureDeserializer {
    /// Creates a `SignatureDeserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<Signature> for SignatureDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Signature, E> {
        context("Failed Signature deserialization", |input: &'a [u8]| {
            let (rest, bytes) = take(SIGNATURE_SIZE_BYTES)(input)?;
            let mut raw = [0u8; SIGNATURE_SIZE_BYTES];
            raw.copy_from_slice(bytes);
            Ok((rest, Signature::from_bytes(&raw)))
        })(buffer)
    }
}
