//! # flow-core
//!
//! The BlockFlow consensus core: `G²` per-chain DAGs with fork support,
//! block weights, best-dependency selection, cross-chain consistency
//! validation, difficulty retargeting, the orphan buffer, and the sync
//! locator/inventory computations.
//!
//! The [`BlockFlow`] type is the single authority over ledger structure.
//! Handlers read it behind a lock for validation snapshots; only the flow
//! handler mutates it.

mod blockflow;
mod chain;
mod error;
mod genesis;
mod locators;
mod orphans;
mod params;
mod target;

pub use blockflow::{AddResult, AddedBlock, BlockFlow};
pub use chain::Chain;
pub use error::{FlowError, FlowResult, ValidationError};
pub use genesis::genesis_block;
pub use locators::{locator_heights, MAX_INVENTORY_PER_CHAIN};
pub use orphans::OrphanPool;
pub use params::ConsensusParams;
pub use target::{TargetAdjustment, TargetSample, WindowedMeanAdjustment};
