//! Node configuration: TOML file plus environment overrides, with defaults
//! so a node starts with zero configuration for local development.

use crate::error::{BlackTraceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pConfig {
    pub listen_addr: String,
    pub bootstrap_peers: Vec<String>,
    pub mdns_enabled: bool,
    pub gossip_topic: String,
}

impl Default for P2pConfig {
    fn default() -> Self {
        P2pConfig {
            listen_addr: "/ip4/0.0.0.0/tcp/0".to_string(),
            bootstrap_peers: Vec::new(),
            mdns_enabled: true,
            gossip_topic: "orders.v1".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub zcash_rpc_url: String,
    pub zcash_rpc_user: String,
    pub zcash_rpc_password: String,
    pub zcash_network: String,
    pub dest_rpc_url: String,
    pub dest_contract_address: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            zcash_rpc_url: "http://127.0.0.1:18232".to_string(),
            zcash_rpc_user: "".to_string(),
            zcash_rpc_password: "".to_string(),
            zcash_network: "testnet".to_string(),
            dest_rpc_url: "http://127.0.0.1:8545".to_string(),
            dest_contract_address: "".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// T_dest, the destination-chain timeout window.
    pub dest_timeout_secs: u64,
    /// Multiplier enforcing source_timeout_abs >= dest_timeout_abs + 2*T_dest.
    pub source_timeout_multiplier: u64,
    /// Safety margin subtracted before a failure transition is triggered.
    pub failure_margin_secs: u64,
    pub data_dir: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        SettlementConfig {
            dest_timeout_secs: 3600,
            source_timeout_multiplier: 2,
            failure_margin_secs: 300,
            data_dir: "./data/settlements".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub identity_dir: String,
    pub session_ttl_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig {
            identity_dir: "./data/identities".to_string(),
            session_ttl_secs: 24 * 3600,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub p2p: P2pConfig,
    pub chain: ChainConfig,
    pub settlement: SettlementConfig,
    pub identity: IdentityConfig,
    /// Consecutive peer failures before exclusion from gossip fan-out.
    pub peer_unhealthy_threshold: u32,
    pub shutdown_grace_period_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            p2p: P2pConfig::default(),
            chain: ChainConfig::default(),
            settlement: SettlementConfig::default(),
            identity: IdentityConfig::default(),
            peer_unhealthy_threshold: 3,
            shutdown_grace_period_secs: 10,
        }
    }
}

impl NodeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: NodeConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            let mut config = NodeConfig::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BLACKTRACE_P2P_LISTEN_ADDR") {
            self.p2p.listen_addr = v;
        }
        if let Ok(v) = std::env::var("BLACKTRACE_ZCASH_RPC_URL") {
            self.chain.zcash_rpc_url = v;
        }
        if let Ok(v) = std::env::var("BLACKTRACE_DEST_RPC_URL") {
            self.chain.dest_rpc_url = v;
        }
        if let Ok(v) = std::env::var("BLACKTRACE_DATA_DIR") {
            self.settlement.data_dir = format!("{}/settlements", v);
            self.identity.identity_dir = format!("{}/identities", v);
        }
    }

    pub fn dest_timeout(&self) -> Duration {
        Duration::from_secs(self.settlement.dest_timeout_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(
            self.settlement.dest_timeout_secs * self.settlement.source_timeout_multiplier,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.settlement.source_timeout_multiplier < 2 {
            return Err(BlackTraceError::InvalidConfig(
                "settlement.source_timeout_multiplier must be >= 2 to satisfy the timelock safety invariant".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_source_timeout_is_at_least_double_dest() {
        let config = NodeConfig::default();
        assert!(config.source_timeout() >= config.dest_timeout() * 2);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = NodeConfig::load_or_default("/nonexistent/blacktrace.toml").unwrap();
        assert_eq!(config.p2p.gossip_topic, "orders.v1");
    }

    #[test]
    fn test_reject_invalid_multiplier() {
        let mut config = NodeConfig::default();
        config.settlement.source_timeout_multiplier = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [p2p]
            listen_addr = "/ip4/127.0.0.1/tcp/9000"
        "#;
        let config: NodeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.p2p.listen_addr, "/ip4/127.0.0.1/tcp/9000");
        assert_eq!(config.p2p.gossip_topic, "orders.v1");
    }
}
