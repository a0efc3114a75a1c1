// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! 32-byte digests used to fingerprint blocks and commitments.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod error;
mod hash;

pub use error::HashError;
pub use hash::{Hash, HashDeserializer, HashSerializer, HASH_SIZE_BYTES};
