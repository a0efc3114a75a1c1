// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Hard-coded protocol values.
//!
//! These values are not meant to be changed by a node operator. Workers receive them through
//! their `cfg` parameter, filled from here in `config.rs` / `settings.rs` files, which keeps
//! unit tests free to use other values.

mod constants;

pub use constants::*;
