//! # Node Configuration
//!
//! Runtime configuration for `levy-node`, loaded from a TOML file. Every
//! field has a default, so a missing file section (or a missing file, for
//! `run` without `--config`) yields a working devnet setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use levy_contracts::{FeeVariant, TokenConfig};
use levy_protocol::config::{DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};
use levy_protocol::{Address, Amount};

use crate::logging::LogFormat;

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub genesis: GenesisSection,
}

/// `[node]`: listeners and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSection {
    /// Host address for the API server.
    #[serde(default = "default_rpc_host")]
    pub rpc_host: String,

    /// Port for the REST, WebSocket, and JSON-RPC API.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

/// `[genesis]`: parameters for the token created on first start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisSection {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Initializer and owner. Receives the initial supply.
    #[serde(default = "default_owner")]
    pub owner: Address,

    #[serde(default = "default_treasury")]
    pub treasury: Address,

    /// Hex-encoded rate, e.g. `"0x64"` for 100.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Amount,

    #[serde(default = "default_fee_variant")]
    pub fee_variant: FeeVariant,
}

fn default_rpc_host() -> String {
    "127.0.0.1".to_string()
}

fn default_rpc_port() -> u16 {
    DEFAULT_RPC_PORT
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

fn default_log_level() -> String {
    "levy_node=info,levy_contracts=info,tower_http=info".to_string()
}

fn default_name() -> String {
    "Levy Token".to_string()
}

fn default_symbol() -> String {
    "LEVY".to_string()
}

fn default_owner() -> Address {
    Address::new([0x11; 20])
}

fn default_treasury() -> Address {
    Address::new([0xEE; 20])
}

fn default_fee_rate() -> Amount {
    Amount::from(100u64)
}

fn default_fee_variant() -> FeeVariant {
    FeeVariant::ExemptionChecked
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            rpc_host: default_rpc_host(),
            rpc_port: default_rpc_port(),
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for GenesisSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            symbol: default_symbol(),
            owner: default_owner(),
            treasury: default_treasury(),
            fee_rate: default_fee_rate(),
            fee_variant: default_fee_variant(),
        }
    }
}

impl GenesisSection {
    /// Token initialization parameters for this genesis.
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            treasury: self.treasury,
            fee_rate: self.fee_rate,
            variant: self.fee_variant,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: NodeConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Loads `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render config as TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: NodeConfig = toml::from_str("").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.node.rpc_port, 9841);
        assert_eq!(config.genesis.fee_variant, FeeVariant::ExemptionChecked);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            [node]
            rpc_port = 7000

            [genesis]
            fee_rate = "0xc8"
            fee_variant = "unconditional"
            "#,
        )
        .unwrap();

        assert_eq!(config.node.rpc_port, 7000);
        assert_eq!(config.node.metrics_port, 9842);
        assert_eq!(config.genesis.fee_rate, Amount::from(200u64));
        assert_eq!(config.genesis.fee_variant, FeeVariant::Unconditional);
        assert_eq!(config.genesis.symbol, "LEVY");
    }

    #[test]
    fn rendered_toml_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("levy.toml");
        let mut config = NodeConfig::default();
        config.genesis.owner = Address::new([0x42; 20]);

        fs::write(&path, config.to_toml().unwrap()).unwrap();
        assert_eq!(NodeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert!(NodeConfig::load(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn log_format_is_checked_at_load() {
        let config: NodeConfig = toml::from_str("[node]\nlog_format = \"json\"\n").unwrap();
        assert_eq!(config.node.log_format, LogFormat::Json);
        assert_eq!(config.node.log_level, default_log_level());

        assert!(toml::from_str::<NodeConfig>("[node]\nlog_format = \"yaml\"\n").is_err());
    }

    #[test]
    fn bad_address_is_reported() {
        let err = toml::from_str::<NodeConfig>("[genesis]\nowner = \"0x1234\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid"));
    }
}
