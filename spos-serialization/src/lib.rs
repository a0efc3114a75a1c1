// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Binary serialization primitives shared by every crate of the consensus engine.
//!
//! Each type that travels on the wire gets a dedicated `Serializer` and `Deserializer`
//! struct. Deserializers are `nom` parsers that carry their own bounds, so that a
//! malicious peer can never make us allocate more than the protocol allows.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

use displaydoc::Display;
use nom::{
    bytes::complete::take,
    error::{context, ContextError, ErrorKind, ParseError},
    multi::length_data,
    IResult, Parser,
};
use std::fmt;
use std::ops::{Bound, RangeBounds};
use thiserror::Error;
use unsigned_varint::decode;
use unsigned_varint::encode;

/// Error that can occur while serializing
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum SerializeError {
    /// Number {0} is too big to be serialized
    NumberTooBig(String),
    /// General error {0}
    GeneralError(String),
}

/// Error accumulated by the `nom` parsers of this workspace.
/// Every failed combinator and every context pushes an entry, from the innermost to the outermost.
#[derive(Debug, PartialEq, Eq)]
pub struct DeserializeError<'a> {
    errors: Vec<(&'a [u8], String)>,
}

impl<'a> ParseError<&'a [u8]> for DeserializeError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        DeserializeError {
            errors: vec![(input, kind.description().to_string())],
        }
    }

    fn append(input: &'a [u8], kind: ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, kind.description().to_string()));
        other
    }
}

impl<'a> ContextError<&'a [u8]> for DeserializeError<'a> {
    fn add_context(input: &'a [u8], ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx.to_string()));
        other
    }
}

impl<'a> fmt::Display for DeserializeError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.errors.len().saturating_sub(1);
        for (i, (input, error)) in self.errors.iter().enumerate() {
            write!(f, "{} (remaining {} bytes)", error, input.len())?;
            if i < last {
                write!(f, " / ")?;
            }
        }
        Ok(())
    }
}

/// Serialize a value of type `T` at the end of a buffer
pub trait Serializer<T> {
    /// Appends the binary representation of `value` to `buffer`
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>) -> Result<(), SerializeError>;
}

/// Deserialize a value of type `T` from the beginning of a buffer
pub trait Deserializer<T> {
    /// Parses a `T` and returns it with the rest of the buffer
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], T, E>;
}

fn fail<'a, E: ParseError<&'a [u8]>>(input: &'a [u8], kind: ErrorKind) -> nom::Err<E> {
    nom::Err::Error(E::from_error_kind(input, kind))
}

/// Serializer for `u64` as an unsigned varint
#[derive(Clone, Copy, Default)]
pub struct U64VarIntSerializer;

impl U64VarIntSerializer {
    /// Creates a `U64VarIntSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<u64> for U64VarIntSerializer {
    fn serialize(&self, value: &u64, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(encode::u64(*value, &mut encode::u64_buffer()));
        Ok(())
    }
}

/// Deserializer for `u64` encoded as an unsigned varint, with bounds checks
#[derive(Clone, Copy)]
pub struct U64VarIntDeserializer {
    range: (Bound<u64>, Bound<u64>),
}

impl U64VarIntDeserializer {
    /// Creates a `U64VarIntDeserializer` accepting values within `(min, max)`
    pub const fn new(min: Bound<u64>, max: Bound<u64>) -> Self {
        Self { range: (min, max) }
    }
}

impl Deserializer<u64> for U64VarIntDeserializer {
    /// ```
    /// use std::ops::Bound::Included;
    /// use spos_serialization::{Deserializer, DeserializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer};
    ///
    /// let mut buffer = Vec::new();
    /// U64VarIntSerializer::new().serialize(&300, &mut buffer).unwrap();
    /// let (rest, value) = U64VarIntDeserializer::new(Included(0), Included(1000))
    ///     .deserialize::<DeserializeError>(&buffer)
    ///     .unwrap();
    /// assert!(rest.is_empty());
    /// assert_eq!(value, 300);
    /// ```
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], u64, E> {
        context("Failed u64 deserialization", |input: &'a [u8]| {
            let (value, rest) =
                decode::u64(input).map_err(|_| fail(input, ErrorKind::Fail))?;
            if !self.range.contains(&value) {
                return Err(fail(input, ErrorKind::Verify));
            }
            Ok((rest, value))
        })(buffer)
    }
}

/// Serializer for `u32` as an unsigned varint
#[derive(Clone, Copy, Default)]
pub struct U32VarIntSerializer;

impl U32VarIntSerializer {
    /// Creates a `U32VarIntSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<u32> for U32VarIntSerializer {
    fn serialize(&self, value: &u32, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(encode::u32(*value, &mut encode::u32_buffer()));
        Ok(())
    }
}

/// Deserializer for `u32` encoded as an unsigned varint, with bounds checks
#[derive(Clone, Copy)]
pub struct U32VarIntDeserializer {
    range: (Bound<u32>, Bound<u32>),
}

impl U32VarIntDeserializer {
    /// Creates a `U32VarIntDeserializer` accepting values within `(min, max)`
    pub const fn new(min: Bound<u32>, max: Bound<u32>) -> Self {
        Self { range: (min, max) }
    }
}

impl Deserializer<u32> for U32VarIntDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], u32, E> {
        context("Failed u32 deserialization", |input: &'a [u8]| {
            let (value, rest) =
                decode::u32(input).map_err(|_| fail(input, ErrorKind::Fail))?;
            if !self.range.contains(&value) {
                return Err(fail(input, ErrorKind::Verify));
            }
            Ok((rest, value))
        })(buffer)
    }
}

/// Serializer for `i64` as 8 big endian bytes
#[derive(Clone, Copy, Default)]
pub struct I64Serializer;

impl I64Serializer {
    /// Creates an `I64Serializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<i64> for I64Serializer {
    fn serialize(&self, value: &i64, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }
}

/// Deserializer for `i64` stored as 8 big endian bytes
#[derive(Clone, Copy)]
pub struct I64Deserializer {
    range: (Bound<i64>, Bound<i64>),
}

impl I64Deserializer {
    /// Creates an `I64Deserializer` accepting values within `(min, max)`
    pub const fn new(min: Bound<i64>, max: Bound<i64>) -> Self {
        Self { range: (min, max) }
    }
}

impl Deserializer<i64> for I64Deserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], i64, E> {
        context("Failed i64 deserialization", |input: &'a [u8]| {
            let (rest, bytes) = take(8usize)(input)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            let value = i64::from_be_bytes(raw);
            if !self.range.contains(&value) {
                return Err(fail(input, ErrorKind::Verify));
            }
            Ok((rest, value))
        })(buffer)
    }
}

/// Serializer for a length-prefixed `Vec<u8>`
#[derive(Clone, Copy, Default)]
pub struct VecU8Serializer {
    len_serializer: U64VarIntSerializer,
}

impl VecU8Serializer {
    /// Creates a `VecU8Serializer`
    pub const fn new() -> Self {
        Self {
            len_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Vec<u8>> for VecU8Serializer {
    fn serialize(&self, value: &Vec<u8>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let len: u64 = value.len().try_into().map_err(|err| {
            SerializeError::NumberTooBig(format!("too many bytes in Vec<u8>: {}", err))
        })?;
        self.len_serializer.serialize(&len, buffer)?;
        buffer.extend(value);
        Ok(())
    }
}

/// Deserializer for a length-prefixed `Vec<u8>`
#[derive(Clone, Copy)]
pub struct VecU8Deserializer {
    len_deserializer: U64VarIntDeserializer,
}

impl VecU8Deserializer {
    /// Creates a `VecU8Deserializer` accepting lengths within `(min_length, max_length)`
    pub const fn new(min_length: Bound<u64>, max_length: Bound<u64>) -> Self {
        Self {
            len_deserializer: U64VarIntDeserializer::new(min_length, max_length),
        }
    }
}

impl Deserializer<Vec<u8>> for VecU8Deserializer {
    /// ```
    /// use std::ops::Bound::Included;
    /// use spos_serialization::{Serializer, Deserializer, DeserializeError, VecU8Serializer, VecU8Deserializer};
    ///
    /// let vec = vec![1, 2, 3];
    /// let mut serialized = Vec::new();
    /// VecU8Serializer::new().serialize(&vec, &mut serialized).unwrap();
    /// let (rest, vec_deser) = VecU8Deserializer::new(Included(0), Included(1000))
    ///     .deserialize::<DeserializeError>(&serialized)
    ///     .unwrap();
    /// assert!(rest.is_empty());
    /// assert_eq!(vec, vec_deser);
    /// ```
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<u8>, E> {
        context("Failed Vec<u8> deserialization", |input| {
            length_data(|input| self.len_deserializer.deserialize(input))(input)
        })
        .map(|res: &[u8]| res.to_vec())
        .parse(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paste::paste;
    use std::ops::Bound::{Excluded, Included};

    macro_rules! gen_varint_tests {
        ($($type:ident, $ser:ident, $deser:ident);*) => {
            $(
                paste! {
                    #[test]
                    fn [<test_ $type _varint_bounds>]() {
                        let mut buffer = Vec::new();
                        $ser::new().serialize(&($type::MAX / 2), &mut buffer).unwrap();
                        let deser = $deser::new(Included(0), Included($type::MAX / 2));
                        let (rest, value) = deser.deserialize::<DeserializeError>(&buffer).unwrap();
                        assert!(rest.is_empty());
                        assert_eq!(value, $type::MAX / 2);

                        let strict = $deser::new(Included(0), Excluded($type::MAX / 2));
                        assert!(strict.deserialize::<DeserializeError>(&buffer).is_err());
                    }
                }
            )*
        };
    }

    gen_varint_tests!(u64, U64VarIntSerializer, U64VarIntDeserializer; u32, U32VarIntSerializer, U32VarIntDeserializer);

    #[test]
    fn test_i64_negative_values() {
        let mut buffer = Vec::new();
        I64Serializer::new().serialize(&-42, &mut buffer).unwrap();
        assert_eq!(buffer.len(), 8);
        let (rest, value) = I64Deserializer::new(Included(i64::MIN), Included(i64::MAX))
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(value, -42);
    }

    #[test]
    fn test_vec_u8_too_long_is_rejected() {
        let mut buffer = Vec::new();
        VecU8Serializer::new()
            .serialize(&vec![7u8; 10], &mut buffer)
            .unwrap();
        let deser = VecU8Deserializer::new(Included(0), Included(9));
        let err = deser.deserialize::<DeserializeError>(&buffer).unwrap_err();
        assert!(err.to_string().contains("Vec<u8>"));
    }

    #[test]
    fn test_truncated_buffer_fails() {
        let mut buffer = Vec::new();
        VecU8Serializer::new()
            .serialize(&vec![1, 2, 3, 4], &mut buffer)
            .unwrap();
        buffer.truncate(3);
        let deser = VecU8Deserializer::new(Included(0), Included(100));
        assert!(deser.deserialize::<DeserializeError>(&buffer).is_err());
    }
}
