//! # flow-mining
//!
//! The fair miner. A coordinator owned by the node's main group drives one
//! sub-miner per target group: templates come from the flow handler, each
//! sub-miner scans bounded nonce slices from random starting points, and
//! the coordinator accounts per-group mining counts so no target group is
//! starved by a harder target.

mod addresses;
mod clock;
mod miner;
mod sub_miner;
mod template;

pub use addresses::{derive_group_addresses, GroupAddress};
pub use clock::{Clock, SystemClock};
pub use miner::{FairMiner, MinerConfig, MinerMessage};
pub use sub_miner::{MiningResult, SubMiner};
pub use template::BlockTemplate;

/// Block reward paid by the coinbase, in base units.
pub const COINBASE_REWARD: u64 = 5_000_000_000;
