// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Clocks for deterministic tests

mod manual_timer;

pub use manual_timer::ManualSyncTimer;
