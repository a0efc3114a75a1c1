// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::config::{MAX_MESSAGE_PAYLOAD_SIZE_BYTES, MAX_MESSAGE_TYPE_ID};
use crate::error::{ModelsError, ModelsResult};
use crate::subround::SubroundId;
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::sequence::tuple;
use nom::{IResult, Parser};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use spos_hash::Hash;
use spos_serialization::{
    Deserializer, I64Deserializer, I64Serializer, SerializeError, Serializer,
    U32VarIntDeserializer, U32VarIntSerializer, VecU8Deserializer, VecU8Serializer,
};
use spos_signature::{
    KeyPair, PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature,
    SignatureDeserializer, SignatureSerializer,
};
use spos_time::{SposTime, SposTimeDeserializer, SposTimeSerializer};
use std::ops::Bound::Included;

/// Kind of consensus message
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
)]
#[repr(u32)]
pub enum MessageType {
    /// proposed block body
    BlockBody = 0,
    /// proposed block header
    BlockHeader = 1,
    /// hash of a Bellare–Neven commitment
    CommitmentHash = 2,
    /// participation bitmap chosen by the leader
    Bitmap = 3,
    /// Bellare–Neven commitment
    Commitment = 4,
    /// partial signature share
    Signature = 5,
    /// never sent
    Unknown = 6,
}

impl MessageType {
    /// Subround this message contributes to
    pub fn subround(&self) -> SubroundId {
        match self {
            MessageType::BlockBody | MessageType::BlockHeader => SubroundId::BLOCK,
            MessageType::CommitmentHash => SubroundId::COMMITMENT_HASH,
            MessageType::Bitmap => SubroundId::BITMAP,
            MessageType::Commitment => SubroundId::COMMITMENT,
            MessageType::Signature => SubroundId::SIGNATURE,
            MessageType::Unknown => SubroundId::UNKNOWN,
        }
    }
}

/// Signed envelope exchanged on the consensus topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusMessage {
    /// kind of message
    pub msg_type: MessageType,
    /// fingerprint of the block the message is about, empty for a body or header proposal
    pub block_header_hash: Vec<u8>,
    /// type-specific content
    pub payload: Vec<u8>,
    /// sender
    pub pub_key: PublicKey,
    /// round the message belongs to
    pub round_index: i64,
    /// synchronized time at which the sender built the message
    pub time_stamp: SposTime,
    /// sender signature over every other field
    pub signature: Signature,
}

/// Everything a `ConsensusMessage` carries except its signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusMessageContent {
    /// kind of message
    pub msg_type: MessageType,
    /// fingerprint of the block the message is about
    pub block_header_hash: Vec<u8>,
    /// type-specific content
    pub payload: Vec<u8>,
    /// sender
    pub pub_key: PublicKey,
    /// round the message belongs to
    pub round_index: i64,
    /// synchronized time at which the sender built the message
    pub time_stamp: SposTime,
}

impl ConsensusMessageContent {
    /// Hash signed by the sender
    pub fn compute_hash(&self) -> ModelsResult<Hash> {
        if self.msg_type == MessageType::Unknown {
            return Err(ModelsError::InvalidMessageType(self.msg_type.into()));
        }
        let mut buffer = Vec::new();
        ConsensusMessageContentSerializer::new().serialize(self, &mut buffer)?;
        Ok(Hash::compute_from(&buffer))
    }

    /// Signs the content with `keypair`. The sender field must match the keypair.
    pub fn sign(self, keypair: &KeyPair) -> ModelsResult<ConsensusMessage> {
        if keypair.get_public_key() != self.pub_key {
            return Err(ModelsError::SignatureError(
                spos_signature::SposSignatureError::SignatureError(
                    "keypair does not match the sender public key".into(),
                ),
            ));
        }
        let signature = keypair.sign(&self.compute_hash()?)?;
        Ok(ConsensusMessage {
            msg_type: self.msg_type,
            block_header_hash: self.block_header_hash,
            payload: self.payload,
            pub_key: self.pub_key,
            round_index: self.round_index,
            time_stamp: self.time_stamp,
            signature,
        })
    }
}

impl ConsensusMessage {
    /// Builds and signs a message sent by the owner of `keypair`
    pub fn new_signed(
        keypair: &KeyPair,
        msg_type: MessageType,
        block_header_hash: Vec<u8>,
        payload: Vec<u8>,
        round_index: i64,
        time_stamp: SposTime,
    ) -> ModelsResult<ConsensusMessage> {
        ConsensusMessageContent {
            msg_type,
            block_header_hash,
            payload,
            pub_key: keypair.get_public_key(),
            round_index,
            time_stamp,
        }
        .sign(keypair)
    }

    /// Unsigned part of the message
    pub fn content(&self) -> ConsensusMessageContent {
        ConsensusMessageContent {
            msg_type: self.msg_type,
            block_header_hash: self.block_header_hash.clone(),
            payload: self.payload.clone(),
            pub_key: self.pub_key,
            round_index: self.round_index,
            time_stamp: self.time_stamp,
        }
    }

    /// Checks the envelope signature against the sender key
    pub fn verify_signature(&self) -> ModelsResult<()> {
        let hash = self.content().compute_hash()?;
        self.pub_key.verify_signature(&hash, &self.signature)?;
        Ok(())
    }
}

/// Serializer for `ConsensusMessageContent`
#[derive(Clone, Copy, Default)]
pub struct ConsensusMessageContentSerializer {
    u32_serializer: U32VarIntSerializer,
    bytes_serializer: VecU8Serializer,
    pub_key_serializer: PublicKeySerializer,
    i64_serializer: I64Serializer,
    time_serializer: SposTimeSerializer,
}

impl ConsensusMessageContentSerializer {
    /// Creates a `ConsensusMessageContentSerializer`
    pub const fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
            bytes_serializer: VecU8Serializer::new(),
            pub_key_serializer: PublicKeySerializer::new(),
            i64_serializer: I64Serializer::new(),
            time_serializer: SposTimeSerializer::new(),
        }
    }
}

impl Serializer<ConsensusMessageContent> for ConsensusMessageContentSerializer {
    fn serialize(
        &self,
        value: &ConsensusMessageContent,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        if value.msg_type == MessageType::Unknown {
            return Err(SerializeError::GeneralError(
                "cannot serialize a message of unknown type".into(),
            ));
        }
        self.u32_serializer
            .serialize(&u32::from(value.msg_type), buffer)?;
        self.bytes_serializer
            .serialize(&value.block_header_hash, buffer)?;
        self.bytes_serializer.serialize(&value.payload, buffer)?;
        self.pub_key_serializer.serialize(&value.pub_key, buffer)?;
        self.i64_serializer.serialize(&value.round_index, buffer)?;
        self.time_serializer.serialize(&value.time_stamp, buffer)?;
        Ok(())
    }
}

/// Serializer for `ConsensusMessage`
#[derive(Clone, Copy, Default)]
pub struct ConsensusMessageSerializer {
    content_serializer: ConsensusMessageContentSerializer,
    signature_serializer: SignatureSerializer,
}

impl ConsensusMessageSerializer {
    /// Creates a `ConsensusMessageSerializer`
    pub const fn new() -> Self {
        Self {
            content_serializer: ConsensusMessageContentSerializer::new(),
            signature_serializer: SignatureSerializer::new(),
        }
    }
}

impl Serializer<ConsensusMessage> for ConsensusMessageSerializer {
    fn serialize(
        &self,
        value: &ConsensusMessage,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.content_serializer.serialize(&value.content(), buffer)?;
        self.signature_serializer
            .serialize(&value.signature, buffer)?;
        Ok(())
    }
}

/// Deserializer for `ConsensusMessage`
#[derive(Clone, Copy)]
pub struct ConsensusMessageDeserializer {
    type_deserializer: U32VarIntDeserializer,
    hash_deserializer: VecU8Deserializer,
    payload_deserializer: VecU8Deserializer,
    pub_key_deserializer: PublicKeyDeserializer,
    round_deserializer: I64Deserializer,
    time_deserializer: SposTimeDeserializer,
    signature_deserializer: SignatureDeserializer,
}

impl ConsensusMessageDeserializer {
    /// Creates a `ConsensusMessageDeserializer` accepting payloads up to `max_payload_size` bytes
    pub fn new(max_payload_size: u64) -> Self {
        Self {
            type_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_MESSAGE_TYPE_ID),
            ),
            hash_deserializer: VecU8Deserializer::new(
                Included(0),
                Included(spos_hash::HASH_SIZE_BYTES as u64),
            ),
            payload_deserializer: VecU8Deserializer::new(Included(0), Included(max_payload_size)),
            pub_key_deserializer: PublicKeyDeserializer::new(),
            round_deserializer: I64Deserializer::new(Included(i64::MIN), Included(i64::MAX)),
            time_deserializer: SposTimeDeserializer::new((
                Included(SposTime::from_millis(0)),
                Included(SposTime::max()),
            )),
            signature_deserializer: SignatureDeserializer::new(),
        }
    }
}

impl Default for ConsensusMessageDeserializer {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_PAYLOAD_SIZE_BYTES)
    }
}

impl Deserializer<ConsensusMessage> for ConsensusMessageDeserializer {
    /// ## Example
    /// ```rust
    /// # use spos_models::message::*;
    /// # use spos_serialization::{DeserializeError, Deserializer, Serializer};
    /// # use spos_signature::KeyPair;
    /// # use spos_time::SposTime;
    /// let keypair = KeyPair::generate();
    /// let message = ConsensusMessage::new_signed(
    ///     &keypair,
    ///     MessageType::Signature,
    ///     vec![1; 32],
    ///     vec![2; 64],
    ///     12,
    ///     SposTime::from_millis(48_000),
    /// )
    /// .unwrap();
    /// let mut buffer = Vec::new();
    /// ConsensusMessageSerializer::new().serialize(&message, &mut buffer).unwrap();
    /// let (rest, decoded) = ConsensusMessageDeserializer::default()
    ///     .deserialize::<DeserializeError>(&buffer)
    ///     .unwrap();
    /// assert!(rest.is_empty());
    /// assert_eq!(decoded, message);
    /// decoded.verify_signature().unwrap();
    /// ```
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ConsensusMessage, E> {
        context(
            "Failed ConsensusMessage deserialization",
            tuple((
                context("Failed msg_type deserialization", |input| {
                    let (rest, id) = self.type_deserializer.deserialize(input)?;
                    match MessageType::try_from(id) {
                        Ok(MessageType::Unknown) | Err(_) => Err(nom::Err::Error(
                            E::from_error_kind(input, ErrorKind::Verify),
                        )),
                        Ok(msg_type) => Ok((rest, msg_type)),
                    }
                }),
                context("Failed block_header_hash deserialization", |input| {
                    self.hash_deserializer.deserialize(input)
                }),
                context("Failed payload deserialization", |input| {
                    self.payload_deserializer.deserialize(input)
                }),
                context("Failed pub_key deserialization", |input| {
                    self.pub_key_deserializer.deserialize(input)
                }),
                context("Failed round_index deserialization", |input| {
                    self.round_deserializer.deserialize(input)
                }),
                context("Failed time_stamp deserialization", |input| {
                    self.time_deserializer.deserialize(input)
                }),
                context("Failed signature deserialization", |input| {
                    self.signature_deserializer.deserialize(input)
                }),
            )),
        )
        .map(
            |(msg_type, block_header_hash, payload, pub_key, round_index, time_stamp, signature)| {
                ConsensusMessage {
                    msg_type,
                    block_header_hash,
                    payload,
                    pub_key,
                    round_index,
                    time_stamp,
                    signature,
                }
            },
        )
        .parse(buffer)
    }
}

/// Serializes a message for the consensus topic
pub fn encode_message(message: &ConsensusMessage) -> ModelsResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ConsensusMessageSerializer::new().serialize(message, &mut buffer)?;
    Ok(buffer)
}

/// Parses a message received on the consensus topic. Trailing bytes are rejected.
pub fn decode_message(
    deserializer: &ConsensusMessageDeserializer,
    bytes: &[u8],
) -> ModelsResult<ConsensusMessage> {
    let (rest, message) = deserializer
        .deserialize::<spos_serialization::DeserializeError>(bytes)
        .map_err(|err| ModelsError::DeserializeError(err.to_string()))?;
    if !rest.is_empty() {
        return Err(ModelsError::DeserializeError(format!(
            "{} trailing bytes after message",
            rest.len()
        )));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn message(keypair: &KeyPair) -> ConsensusMessage {
        ConsensusMessage::new_signed(
            keypair,
            MessageType::BlockHeader,
            Vec::new(),
            b"header".to_vec(),
            3,
            SposTime::from_millis(12_000),
        )
        .unwrap()
    }

    #[test]
    fn test_envelope_roundtrip() {
        let keypair = KeyPair::generate();
        let msg = ConsensusMessage::new_signed(
            &keypair,
            MessageType::Signature,
            vec![9; 32],
            vec![1, 2, 3],
            -2,
            SposTime::from_millis(7_000),
        )
        .unwrap();
        let bytes = encode_message(&msg).unwrap();
        let decoded = decode_message(&ConsensusMessageDeserializer::default(), &bytes).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.round_index, -2);
        decoded.verify_signature().unwrap();
        assert_eq!(encode_message(&decoded).unwrap(), bytes);
    }

    #[test]
    fn test_tampered_message_fails_verification() {
        let keypair = KeyPair::generate();
        let mut msg = message(&keypair);
        msg.verify_signature().unwrap();
        msg.round_index = 4;
        assert_matches!(msg.verify_signature(), Err(ModelsError::SignatureError(_)));

        let mut msg = message(&keypair);
        msg.pub_key = KeyPair::generate().get_public_key();
        assert!(msg.verify_signature().is_err());
    }

    #[test]
    fn test_unknown_type_is_rejected_on_the_wire() {
        let keypair = KeyPair::generate();
        let msg = message(&keypair);
        let mut buffer = encode_message(&msg).unwrap();
        // first byte is the varint type id
        buffer[0] = u32::from(MessageType::Unknown) as u8;
        let deserializer = ConsensusMessageDeserializer::default();
        assert_matches!(
            decode_message(&deserializer, &buffer),
            Err(ModelsError::DeserializeError(_))
        );
        buffer[0] = 42;
        assert!(decode_message(&deserializer, &buffer).is_err());
    }

    #[test]
    fn test_unknown_type_cannot_be_signed() {
        let keypair = KeyPair::generate();
        assert_matches!(
            ConsensusMessage::new_signed(
                &keypair,
                MessageType::Unknown,
                Vec::new(),
                Vec::new(),
                0,
                SposTime::from_millis(0),
            ),
            Err(ModelsError::InvalidMessageType(6))
        );
    }

    #[test]
    fn test_trailing_bytes_and_oversized_payload() {
        let keypair = KeyPair::generate();
        let msg = message(&keypair);
        let mut buffer = encode_message(&msg).unwrap();
        let deserializer = ConsensusMessageDeserializer::new(4);
        assert!(decode_message(&deserializer, &buffer).is_err());
        buffer.push(0);
        assert!(decode_message(&ConsensusMessageDeserializer::default(), &buffer).is_err());
    }

    #[test]
    fn test_message_type_subrounds() {
        assert_eq!(MessageType::BlockBody.subround(), SubroundId::BLOCK);
        assert_eq!(MessageType::Commitment.subround(), SubroundId::COMMITMENT);
        assert_eq!(
            MessageType::try_from(3u32).unwrap(),
            MessageType::Bitmap
        );
    }
}
