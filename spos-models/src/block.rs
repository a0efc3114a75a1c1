// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::config::{
    MAX_BITMAP_SIZE_BYTES, MAX_MINI_BLOCKS_PER_BLOCK, MAX_RAND_SEED_SIZE_BYTES,
    MAX_SIGNATURE_SIZE_BYTES, MAX_TRANSACTIONS_PER_MINI_BLOCK,
};
use crate::error::ModelsResult;
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::sequence::tuple;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use spos_hash::{Hash, HashDeserializer, HashSerializer};
use spos_serialization::{
    Deserializer, I64Deserializer, I64Serializer, SerializeError, Serializer,
    U32VarIntDeserializer, U32VarIntSerializer, U64VarIntDeserializer, U64VarIntSerializer,
    VecU8Deserializer, VecU8Serializer,
};
use spos_time::{SposTime, SposTimeDeserializer, SposTimeSerializer};
use std::fmt;
use std::ops::Bound::Included;

/// Shard identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShardId(pub u32);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn len_u32<T>(items: &[T], what: &str) -> Result<u32, SerializeError> {
    items
        .len()
        .try_into()
        .map_err(|err| SerializeError::NumberTooBig(format!("too many {}: {}", what, err)))
}

/// Transactions moving from one shard to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniBlock {
    /// shard that produced the transactions
    pub sender_shard: ShardId,
    /// shard that must execute them
    pub receiver_shard: ShardId,
    /// transaction hashes
    pub tx_hashes: Vec<Hash>,
}

impl MiniBlock {
    /// Fingerprint of the mini-block
    pub fn compute_hash(&self) -> ModelsResult<Hash> {
        let mut buffer = Vec::new();
        MiniBlockSerializer::new().serialize(self, &mut buffer)?;
        Ok(Hash::compute_from(&buffer))
    }

    /// Summary carried by the block header
    pub fn header(&self) -> ModelsResult<MiniBlockHeader> {
        Ok(MiniBlockHeader {
            sender_shard: self.sender_shard,
            receiver_shard: self.receiver_shard,
            hash: self.compute_hash()?,
            tx_count: len_u32(&self.tx_hashes, "transactions")?,
        })
    }
}

/// Header-side summary of a mini-block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniBlockHeader {
    /// shard that produced the transactions
    pub sender_shard: ShardId,
    /// shard that must execute them
    pub receiver_shard: ShardId,
    /// `MiniBlock::compute_hash`
    pub hash: Hash,
    /// number of transactions
    pub tx_count: u32,
}

/// Proposed block content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBody {
    /// mini-blocks, in-shard and cross-shard
    pub mini_blocks: Vec<MiniBlock>,
}

impl BlockBody {
    /// Fingerprint of the body, stored in `BlockHeader::body_hash`
    pub fn compute_hash(&self) -> ModelsResult<Hash> {
        let mut buffer = Vec::new();
        BlockBodySerializer::new().serialize(self, &mut buffer)?;
        Ok(Hash::compute_from(&buffer))
    }

    /// Headers of every mini-block, in body order
    pub fn mini_block_headers(&self) -> ModelsResult<Vec<MiniBlockHeader>> {
        self.mini_blocks.iter().map(MiniBlock::header).collect()
    }
}

/// Header of a proposed block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// height: parent nonce + 1
    pub nonce: u64,
    /// round index of the proposal
    pub round: i64,
    /// shard of the proposer
    pub shard_id: ShardId,
    /// start of the proposal round
    pub time_stamp: SposTime,
    /// fingerprint of the parent header
    pub prev_hash: Hash,
    /// `BlockBody::compute_hash`
    pub body_hash: Hash,
    /// random seed of the parent
    pub prev_rand_seed: Vec<u8>,
    /// proposer signature over `prev_rand_seed`
    pub rand_seed: Vec<u8>,
    /// summary of the body mini-blocks
    pub mini_block_headers: Vec<MiniBlockHeader>,
    /// signers of `signature`, filled at the end of the round
    pub pub_keys_bitmap: Vec<u8>,
    /// aggregated signature, filled at the end of the round
    pub signature: Vec<u8>,
}

impl BlockHeader {
    /// Fingerprint of the header. Bitmap and aggregated signature are left out so that
    /// sealing a header does not change its identity.
    pub fn compute_hash(&self) -> ModelsResult<Hash> {
        let unsigned = BlockHeader {
            pub_keys_bitmap: Vec::new(),
            signature: Vec::new(),
            ..self.clone()
        };
        let mut buffer = Vec::new();
        BlockHeaderSerializer::new().serialize(&unsigned, &mut buffer)?;
        Ok(Hash::compute_from(&buffer))
    }
}

/// Serializer for `MiniBlock`
#[derive(Clone, Copy, Default)]
pub struct MiniBlockSerializer {
    u32_serializer: U32VarIntSerializer,
    hash_serializer: HashSerializer,
}

impl MiniBlockSerializer {
    /// Creates a `MiniBlockSerializer`
    pub const fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
            hash_serializer: HashSerializer::new(),
        }
    }
}

impl Serializer<MiniBlock> for MiniBlockSerializer {
    fn serialize(&self, value: &MiniBlock, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u32_serializer.serialize(&value.sender_shard.0, buffer)?;
        self.u32_serializer.serialize(&value.receiver_shard.0, buffer)?;
        self.u32_serializer
            .serialize(&len_u32(&value.tx_hashes, "transactions")?, buffer)?;
        for hash in &value.tx_hashes {
            self.hash_serializer.serialize(hash, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `MiniBlock`
#[derive(Clone, Copy)]
pub struct MiniBlockDeserializer {
    shard_deserializer: U32VarIntDeserializer,
    count_deserializer: U32VarIntDeserializer,
    hash_deserializer: HashDeserializer,
}

impl MiniBlockDeserializer {
    /// Creates a `MiniBlockDeserializer` accepting up to `max_transactions` hashes
    pub const fn new(max_transactions: u32) -> Self {
        Self {
            shard_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
            count_deserializer: U32VarIntDeserializer::new(Included(0), Included(max_transactions)),
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Deserializer<MiniBlock> for MiniBlockDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], MiniBlock, E> {
        context(
            "Failed MiniBlock deserialization",
            tuple((
                context("Failed sender_shard deserialization", |input| {
                    self.shard_deserializer.deserialize(input)
                }),
                context("Failed receiver_shard deserialization", |input| {
                    self.shard_deserializer.deserialize(input)
                }),
                context(
                    "Failed tx_hashes deserialization",
                    length_count(
                        |input| self.count_deserializer.deserialize(input),
                        |input| self.hash_deserializer.deserialize(input),
                    ),
                ),
            )),
        )
        .map(|(sender, receiver, tx_hashes)| MiniBlock {
            sender_shard: ShardId(sender),
            receiver_shard: ShardId(receiver),
            tx_hashes,
        })
        .parse(buffer)
    }
}

/// Serializer for `BlockBody`
#[derive(Clone, Copy, Default)]
pub struct BlockBodySerializer {
    u32_serializer: U32VarIntSerializer,
    mini_block_serializer: MiniBlockSerializer,
}

impl BlockBodySerializer {
    /// Creates a `BlockBodySerializer`
    pub const fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
            mini_block_serializer: MiniBlockSerializer::new(),
        }
    }
}

impl Serializer<BlockBody> for BlockBodySerializer {
    fn serialize(&self, value: &BlockBody, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u32_serializer
            .serialize(&len_u32(&value.mini_blocks, "mini-blocks")?, buffer)?;
        for mini_block in &value.mini_blocks {
            self.mini_block_serializer.serialize(mini_block, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `BlockBody`
#[derive(Clone, Copy)]
pub struct BlockBodyDeserializer {
    count_deserializer: U32VarIntDeserializer,
    mini_block_deserializer: MiniBlockDeserializer,
}

impl BlockBodyDeserializer {
    /// Creates a `BlockBodyDeserializer` with the protocol limits
    pub const fn new() -> Self {
        Self {
            count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_MINI_BLOCKS_PER_BLOCK),
            ),
            mini_block_deserializer: MiniBlockDeserializer::new(MAX_TRANSACTIONS_PER_MINI_BLOCK),
        }
    }
}

impl Default for BlockBodyDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<BlockBody> for BlockBodyDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockBody, E> {
        context(
            "Failed BlockBody deserialization",
            length_count(
                |input| self.count_deserializer.deserialize(input),
                |input| self.mini_block_deserializer.deserialize(input),
            ),
        )
        .map(|mini_blocks| BlockBody { mini_blocks })
        .parse(buffer)
    }
}

/// Serializer for `BlockHeader`
#[derive(Clone, Copy, Default)]
pub struct BlockHeaderSerializer {
    u64_serializer: U64VarIntSerializer,
    u32_serializer: U32VarIntSerializer,
    i64_serializer: I64Serializer,
    time_serializer: SposTimeSerializer,
    hash_serializer: HashSerializer,
    bytes_serializer: VecU8Serializer,
}

impl BlockHeaderSerializer {
    /// Creates a `BlockHeaderSerializer`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
            i64_serializer: I64Serializer::new(),
            time_serializer: SposTimeSerializer::new(),
            hash_serializer: HashSerializer::new(),
            bytes_serializer: VecU8Serializer::new(),
        }
    }
}

impl Serializer<BlockHeader> for BlockHeaderSerializer {
    fn serialize(&self, value: &BlockHeader, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u64_serializer.serialize(&value.nonce, buffer)?;
        self.i64_serializer.serialize(&value.round, buffer)?;
        self.u32_serializer.serialize(&value.shard_id.0, buffer)?;
        self.time_serializer.serialize(&value.time_stamp, buffer)?;
        self.hash_serializer.serialize(&value.prev_hash, buffer)?;
        self.hash_serializer.serialize(&value.body_hash, buffer)?;
        self.bytes_serializer
            .serialize(&value.prev_rand_seed, buffer)?;
        self.bytes_serializer.serialize(&value.rand_seed, buffer)?;
        self.u32_serializer.serialize(
            &len_u32(&value.mini_block_headers, "mini-block headers")?,
            buffer,
        )?;
        for mini_block_header in &value.mini_block_headers {
            self.u32_serializer
                .serialize(&mini_block_header.sender_shard.0, buffer)?;
            self.u32_serializer
                .serialize(&mini_block_header.receiver_shard.0, buffer)?;
            self.hash_serializer
                .serialize(&mini_block_header.hash, buffer)?;
            self.u32_serializer
                .serialize(&mini_block_header.tx_count, buffer)?;
        }
        self.bytes_serializer
            .serialize(&value.pub_keys_bitmap, buffer)?;
        self.bytes_serializer.serialize(&value.signature, buffer)?;
        Ok(())
    }
}

/// Deserializer for `BlockHeader`
#[derive(Clone, Copy)]
pub struct BlockHeaderDeserializer {
    nonce_deserializer: U64VarIntDeserializer,
    round_deserializer: I64Deserializer,
    u32_deserializer: U32VarIntDeserializer,
    mini_block_count_deserializer: U32VarIntDeserializer,
    time_deserializer: SposTimeDeserializer,
    hash_deserializer: HashDeserializer,
    seed_deserializer: VecU8Deserializer,
    bitmap_deserializer: VecU8Deserializer,
    signature_deserializer: VecU8Deserializer,
}

impl BlockHeaderDeserializer {
    /// Creates a `BlockHeaderDeserializer` with the protocol limits
    pub fn new() -> Self {
        Self {
            nonce_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
            round_deserializer: I64Deserializer::new(Included(i64::MIN), Included(i64::MAX)),
            u32_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
            mini_block_count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_MINI_BLOCKS_PER_BLOCK),
            ),
            time_deserializer: SposTimeDeserializer::new((
                Included(SposTime::from_millis(0)),
                Included(SposTime::max()),
            )),
            hash_deserializer: HashDeserializer::new(),
            seed_deserializer: VecU8Deserializer::new(
                Included(0),
                Included(MAX_RAND_SEED_SIZE_BYTES),
            ),
            bitmap_deserializer: VecU8Deserializer::new(
                Included(0),
                Included(MAX_BITMAP_SIZE_BYTES),
            ),
            signature_deserializer: VecU8Deserializer::new(
                Included(0),
                Included(MAX_SIGNATURE_SIZE_BYTES),
            ),
        }
    }

    fn mini_block_header<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], MiniBlockHeader, E> {
        tuple((
            |input| self.u32_deserializer.deserialize(input),
            |input| self.u32_deserializer.deserialize(input),
            |input| self.hash_deserializer.deserialize(input),
            |input| self.u32_deserializer.deserialize(input),
        ))
        .map(|(sender, receiver, hash, tx_count)| MiniBlockHeader {
            sender_shard: ShardId(sender),
            receiver_shard: ShardId(receiver),
            hash,
            tx_count,
        })
        .parse(input)
    }
}

impl Default for BlockHeaderDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<BlockHeader> for BlockHeaderDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockHeader, E> {
        context(
            "Failed BlockHeader deserialization",
            tuple((
                context("Failed nonce deserialization", |input| {
                    self.nonce_deserializer.deserialize(input)
                }),
                context("Failed round deserialization", |input| {
                    self.round_deserializer.deserialize(input)
                }),
                context("Failed shard_id deserialization", |input| {
                    self.u32_deserializer.deserialize(input)
                }),
                context("Failed time_stamp deserialization", |input| {
                    self.time_deserializer.deserialize(input)
                }),
                context("Failed prev_hash deserialization", |input| {
                    self.hash_deserializer.deserialize(input)
                }),
                context("Failed body_hash deserialization", |input| {
                    self.hash_deserializer.deserialize(input)
                }),
                context("Failed prev_rand_seed deserialization", |input| {
                    self.seed_deserializer.deserialize(input)
                }),
                context("Failed rand_seed deserialization", |input| {
                    self.seed_deserializer.deserialize(input)
                }),
                context(
                    "Failed mini_block_headers deserialization",
                    length_count(
                        |input| self.mini_block_count_deserializer.deserialize(input),
                        |input| self.mini_block_header(input),
                    ),
                ),
                context("Failed pub_keys_bitmap deserialization", |input| {
                    self.bitmap_deserializer.deserialize(input)
                }),
                context("Failed signature deserialization", |input| {
                    self.signature_deserializer.deserialize(input)
                }),
            )),
        )
        .map(
            |(
                nonce,
                round,
                shard_id,
                time_stamp,
                prev_hash,
                body_hash,
                prev_rand_seed,
                rand_seed,
                mini_block_headers,
                pub_keys_bitmap,
                signature,
            )| BlockHeader {
                nonce,
                round,
                shard_id: ShardId(shard_id),
                time_stamp,
                prev_hash,
                body_hash,
                prev_rand_seed,
                rand_seed,
                mini_block_headers,
                pub_keys_bitmap,
                signature,
            },
        )
        .parse(buffer)
    }
}
