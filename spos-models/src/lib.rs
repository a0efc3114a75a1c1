// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Data model of the consensus engine: rounds, subrounds, the signed message envelope,
//! block artifacts and the local chain tip.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

/// block header, body and mini-blocks
pub mod block;
/// local chain tip
pub mod blockchain;
/// protocol constants and subround schedules
pub mod config;
/// models error
pub mod error;
/// consensus message envelope
pub mod message;
/// round slots
pub mod round;
/// subround ids and statuses
pub mod subround;
