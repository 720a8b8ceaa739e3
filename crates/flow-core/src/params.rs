//! Consensus parameters, fixed per deployment.

use flow_types::{BrokerConfig, U256};

/// Everything the consensus core needs to know about the network, threaded
/// explicitly through construction.
#[derive(Clone, Debug)]
pub struct ConsensusParams {
    /// Number of groups `G`; the grid has `G²` chains.
    pub groups: u32,
    /// This node's broker range.
    pub broker: BrokerConfig,
    /// Expected interval between blocks on one chain, in milliseconds.
    pub block_target_time_ms: u64,
    /// Number of recent headers fed to the retarget strategy.
    pub retarget_window: usize,
    /// Difficulty floor: accepted hashes carry at least this many leading
    /// zero bits.
    pub num_zeros_at_least_in_hash: u32,
    /// Upper bound on any mining target.
    pub max_mining_target: U256,
    /// Run tip pruning every this many added blocks per chain.
    pub tips_prune_interval: u64,
    /// Capacity of the orphan buffer.
    pub orphan_capacity: usize,
}

impl ConsensusParams {
    /// Permissive parameters for tests: two groups, trivial targets, no
    /// difficulty floor.
    pub fn test_default() -> Self {
        Self {
            groups: 2,
            broker: BrokerConfig::single(2),
            block_target_time_ms: 1_000,
            retarget_window: 17,
            num_zeros_at_least_in_hash: 0,
            max_mining_target: U256::max_value(),
            tips_prune_interval: 32,
            orphan_capacity: 256,
        }
    }

    /// Largest target satisfying the leading-zero-bits floor.
    pub fn floor_target(&self) -> U256 {
        let mut bytes = [0xffu8; 32];
        let zeros = self.num_zeros_at_least_in_hash.min(255) as usize;
        for bit in 0..zeros {
            bytes[bit / 8] &= !(0x80 >> (bit % 8));
        }
        U256::from_bytes_be(&bytes)
    }

    /// Clamp a proposed target into the allowed band.
    pub fn clamp_target(&self, proposed: U256) -> U256 {
        proposed.min(self.max_mining_target.clone()).min(self.floor_target())
    }
}
