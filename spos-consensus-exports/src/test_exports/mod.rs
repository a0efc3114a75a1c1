// Copyright (c) 2022 MASSA LABS <info@massa.net>

mod config;
mod local_network;
mod memory_block_processor;

pub use local_network::{LocalMessenger, LocalNetwork};
pub use memory_block_processor::MemoryBlockProcessor;
