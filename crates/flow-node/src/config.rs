//! Node configuration.
//!
//! One immutable `NodeConfig` is loaded from a TOML file, overridden by
//! CLI arguments, and threaded explicitly through construction; nothing
//! reads configuration globally.

use crate::Args;
use anyhow::{bail, Context, Result};
use flow_core::ConsensusParams;
use flow_types::{BrokerConfig, U256};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name, for logs.
    pub node_name: String,
    /// Data directory.
    pub data_dir: PathBuf,
    /// Consensus parameters.
    #[serde(default)]
    pub consensus: ConsensusSection,
    /// Broker range of this node.
    #[serde(default)]
    pub broker: BrokerSection,
    /// Mining configuration.
    #[serde(default)]
    pub mining: MiningSection,
    /// Sync configuration.
    #[serde(default)]
    pub sync: SyncSection,
}

/// Consensus parameters as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSection {
    /// Number of groups `G`.
    pub groups: u32,
    /// Expected per-chain block interval in milliseconds.
    pub block_target_time_ms: u64,
    /// Headers fed into the retarget window.
    pub retarget_window: usize,
    /// Difficulty floor: minimum leading zero bits in accepted hashes.
    pub num_zeros_at_least_in_hash: u32,
    /// Upper bound on mining targets, big-endian hex.
    pub max_mining_target: String,
    /// Tip pruning interval, in blocks per chain.
    pub tips_prune_interval: u64,
    /// Orphan buffer capacity.
    pub orphan_capacity: usize,
}

impl Default for ConsensusSection {
    fn default() -> Self {
        Self {
            groups: 4,
            block_target_time_ms: 64_000,
            retarget_window: 17,
            num_zeros_at_least_in_hash: 24,
            max_mining_target: "00ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
                .to_string(),
            tips_prune_interval: 32,
            orphan_capacity: 1_024,
        }
    }
}

/// Broker range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSection {
    pub broker_from: u32,
    pub broker_until: u32,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            broker_from: 0,
            broker_until: 4,
        }
    }
}

/// Mining configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningSection {
    /// Enable mining at start-up.
    pub enabled: bool,
    /// The group this node mines for.
    pub main_group: u32,
    /// Nonces per sub-miner slice.
    pub nonce_step: u64,
    /// Seed for per-group reward addresses, hex.
    pub address_seed: String,
}

impl Default for MiningSection {
    fn default() -> Self {
        Self {
            enabled: false,
            main_group: 0,
            nonce_step: 20_000,
            address_seed: hex::encode([0u8; 32]),
        }
    }
}

/// Sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Interval between locator publications while syncing, milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
        }
    }
}

impl NodeConfig {
    /// Load configuration from file and CLI args.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Self::default()
        };

        if let Some(ref data_dir) = args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if args.mining {
            config.mining.enabled = true;
        }
        if let Some(main_group) = args.main_group {
            config.mining.main_group = main_group;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let groups = self.consensus.groups;
        if groups == 0 {
            bail!("groups must be positive");
        }
        if self.broker.broker_from >= self.broker.broker_until
            || self.broker.broker_until > groups
        {
            bail!(
                "invalid broker range [{}, {}) for {} groups",
                self.broker.broker_from,
                self.broker.broker_until,
                groups
            );
        }
        if self.mining.main_group >= groups {
            bail!("main group {} out of range", self.mining.main_group);
        }
        Ok(())
    }

    /// Consensus parameters for the core.
    pub fn consensus_params(&self) -> Result<ConsensusParams> {
        let target_bytes: [u8; 32] = hex::decode(&self.consensus.max_mining_target)
            .context("max_mining_target is not hex")?
            .try_into()
            .map_err(|_| anyhow::anyhow!("max_mining_target must be 32 bytes"))?;

        Ok(ConsensusParams {
            groups: self.consensus.groups,
            broker: self.broker_config(),
            block_target_time_ms: self.consensus.block_target_time_ms,
            retarget_window: self.consensus.retarget_window,
            num_zeros_at_least_in_hash: self.consensus.num_zeros_at_least_in_hash,
            max_mining_target: U256::from_bytes_be(&target_bytes),
            tips_prune_interval: self.consensus.tips_prune_interval,
            orphan_capacity: self.consensus.orphan_capacity,
        })
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            groups: self.consensus.groups,
            broker_from: self.broker.broker_from,
            broker_until: self.broker.broker_until,
        }
    }

    /// Seed bytes for reward address derivation.
    pub fn address_seed(&self) -> Result<[u8; 32]> {
        hex::decode(&self.mining.address_seed)
            .context("address_seed is not hex")?
            .try_into()
            .map_err(|_| anyhow::anyhow!("address_seed must be 32 bytes"))
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: "flow-rust-node".to_string(),
            data_dir: PathBuf::from(".flow"),
            consensus: ConsensusSection::default(),
            broker: BrokerSection::default(),
            mining: MiningSection::default(),
            sync: SyncSection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        let params = config.consensus_params().unwrap();
        assert_eq!(params.groups, 4);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = NodeConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.consensus.groups, config.consensus.groups);
        assert_eq!(parsed.mining.nonce_step, config.mining.nonce_step);
    }

    #[test]
    fn test_invalid_broker_range_rejected() {
        let mut config = NodeConfig::default();
        config.broker.broker_until = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_address_seed_parsing() {
        let config = NodeConfig::default();
        assert_eq!(config.address_seed().unwrap(), [0u8; 32]);

        let mut bad = NodeConfig::default();
        bad.mining.address_seed = "zz".into();
        assert!(bad.address_seed().is_err());
    }
}
