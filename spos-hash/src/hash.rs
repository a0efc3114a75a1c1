// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::HashError;
use nom::{
    bytes::complete::take,
    error::{context, ContextError, ParseError},
    IResult,
};
use spos_serialization::{Deserializer, SerializeError, Serializer};
use std::{convert::TryInto, str::FromStr};

/// Size of a hash in bytes
pub const HASH_SIZE_BYTES: usize = 32;

/// A blake3 digest
#[derive(Eq, PartialEq, Copy, Clone, Hash)]
pub struct Hash(blake3::Hash);

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl Hash {
    /// Compute a hash from data.
    ///
    /// # Example
    ///  ```
    /// # use spos_hash::Hash;
    /// let hash = Hash::compute_from(&"hello world".as_bytes());
    /// ```
    pub fn compute_from(data: &[u8]) -> Self {
        Hash(blake3::hash(data))
    }

    /// Compute a hash from several slices, as if they were concatenated.
    ///
    /// ```
    /// # use spos_hash::Hash;
    /// assert_eq!(
    ///     Hash::compute_from_tuple(&[b"hello ", b"world"]),
    ///     Hash::compute_from(b"hello world")
    /// );
    /// ```
    pub fn compute_from_tuple(data: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for chunk in data {
            hasher.update(chunk);
        }
        Hash(hasher.finalize())
    }

    /// Serialize a Hash using bs58 encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Serialize a Hash as bytes.
    pub fn to_bytes(&self) -> &[u8; HASH_SIZE_BYTES] {
        self.0.as_bytes()
    }

    /// Deserialize using bs58 encoding with checksum.
    ///
    /// ```
    /// # use spos_hash::Hash;
    /// let hash = Hash::compute_from(&"hello world".as_bytes());
    /// let serialized: String = hash.to_bs58_check();
    /// let deserialized: Hash = Hash::from_bs58_check(&serialized).unwrap();
    /// assert_eq!(hash, deserialized);
    /// ```
    pub fn from_bs58_check(data: &str) -> Result<Hash, HashError> {
        let decoded_bs58_check = bs58::decode(data)
            .with_check(None)
            .into_vec()
            .map_err(|err| HashError::ParsingError(format!("{}", err)))?;
        Ok(Hash::from_bytes(
            &decoded_bs58_check
                .as_slice()
                .try_into()
                .map_err(|err| HashError::ParsingError(format!("{}", err)))?,
        ))
    }

    /// Deserialize a Hash from bytes.
    pub fn from_bytes(data: &[u8; HASH_SIZE_BYTES]) -> Hash {
        Hash(blake3::Hash::from(*data))
    }

    /// Deserialize a Hash from a slice, checking its length.
    pub fn from_slice(data: &[u8]) -> Result<Hash, HashError> {
        let bytes: &[u8; HASH_SIZE_BYTES] = data.try_into().map_err(|_| {
            HashError::ParsingError(format!(
                "expected {} bytes, got {}",
                HASH_SIZE_BYTES,
                data.len()
            ))
        })?;
        Ok(Hash::from_bytes(bytes))
    }
}

/// Serializer for `Hash`
#[derive(Clone, Copy, Default)]
pub struct HashSerializer;

impl HashSerializer {
    /// Creates a serializer for `Hash`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<Hash> for HashSerializer {
    fn serialize(&self, value: &Hash, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `Hash`
#[derive(Clone, Copy, Default)]
pub struct HashDeserializer;

impl HashDeserializer {
    /// Creates a deserializer for `Hash`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<Hash> for HashDeserializer {
    /// ```
    /// use spos_serialization::{Serializer, Deserializer, DeserializeError};
    /// use spos_hash::{Hash, HashDeserializer, HashSerializer};
    ///
    /// let hash = Hash::compute_from(b"hello world");
    /// let mut buffer = Vec::new();
    /// HashSerializer::new().serialize(&hash, &mut buffer).unwrap();
    /// let (rest, deserialized) = HashDeserializer::new()
    ///     .deserialize::<DeserializeError>(&buffer)
    ///     .unwrap();
    /// assert!(rest.is_empty());
    /// assert_eq!(hash, deserialized);
    /// ```
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Hash, E> {
        context("Failed hash deserialization", |input: &'a [u8]| {
            let (rest, bytes) = take(HASH_SIZE_BYTES)(input)?;
            let mut raw = [0u8; HASH_SIZE_BYTES];
            raw.copy_from_slice(bytes);
            Ok((rest, Hash::from_bytes(&raw)))
        })(buffer)
    }
}

impl ::serde::Serialize for Hash {
    /// Human readable serializers get the bs58check string, binary ones get the raw bytes
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(&self.to_bs58_check())
        } else {
            s.serialize_bytes(self.to_bytes())
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for Hash {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<Hash, D::Error> {
        if d.is_human_readable() {
            struct Base58CheckVisitor;

            impl<'de> ::serde::de::Visitor<'de> for Base58CheckVisitor {
                type Value = Hash;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("an ASCII base58check string")
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Hash::from_bs58_check(v).map_err(E::custom)
                }
            }
            d.deserialize_str(Base58CheckVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> ::serde::de::Visitor<'de> for BytesVisitor {
                type Value = Hash;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a bytestring")
                }

                fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    Hash::from_slice(v).map_err(E::custom)
                }
            }

            d.deserialize_bytes(BytesVisitor)
        }
    }
}

impl FromStr for Hash {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_bs58_check(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_json() {
        let hash = Hash::compute_from("hello world".as_bytes());
        let serialized = serde_json::to_string(&hash).unwrap();
        let deserialized: Hash = serde_json::from_str(&serialized).unwrap();
        assert_eq!(hash, deserialized)
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(Hash::from_slice(&[0u8; 31]).is_err());
        assert!(Hash::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_known_vector() {
        // blake3("abc")
        let hash = Hash::compute_from(b"abc");
        assert_eq!(
            hash.to_bytes()[..4],
            [0x64, 0x37, 0xb3, 0xac]
        );
    }
}
