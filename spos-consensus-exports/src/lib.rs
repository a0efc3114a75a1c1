// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Definition and exports of the consensus configuration, errors and collaborator traits.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod channels;
mod collaborator_traits;
mod config;
mod controller_traits;
mod settings;
mod status;

pub mod error;

pub use channels::ConsensusChannels;
pub use collaborator_traits::{BlockProcessor, CrossShardData, Messenger, ValidatorGroupSelector};
pub use config::ConsensusConfig;
pub use controller_traits::{ConsensusController, ConsensusManager};
pub use settings::{ConsensusSettings, ConsensusVariant};
pub use status::ConsensusStatus;

#[cfg(feature = "test-exports")]
pub use collaborator_traits::{MockMessenger, MockValidatorGroupSelector};
#[cfg(feature = "test-exports")]
pub use controller_traits::MockConsensusController;

/// Exports related to tests as mocks, an in-memory network and configurations
#[cfg(feature = "test-exports")]
pub mod test_exports;
