//! Deployment configuration, stored as TOML.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default name of the configuration file.
pub const CONFIG_FILENAME: &str = "Deploy.toml";

/// Default directory holding the compiled Truffle artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";

/// Default directory holding one address book per network.
pub const DEFAULT_ADDRESSES_DIR: &str = "contractAddresses";

/// Default receipt polling window, 200 blocks at roughly 1.5s.
pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 300;

/// Gas limit used by the public testnets.
const TESTNET_GAS_LIMIT: u64 = 5_000_000;

/// Connection and transaction settings for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// JSON-RPC endpoint of a node holding the deployer account.
    pub rpc_url: String,
    /// Sending account. Defaults to the node's first account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Expected chain id, checked against `eth_chainId` on connect.
    pub network_id: u64,
    /// Gas limit per transaction. Left to the node when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    /// Gas price in wei. Left to the node when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
    /// Blocks to wait on top of the one including the transaction.
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

fn default_receipt_timeout_secs() -> u64 {
    DEFAULT_RECEIPT_TIMEOUT_SECS
}

impl NetworkProfile {
    pub fn new(rpc_url: impl Into<String>, network_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            from: None,
            network_id,
            gas: None,
            gas_price: None,
            confirmations: 0,
            receipt_timeout_secs: DEFAULT_RECEIPT_TIMEOUT_SECS,
        }
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    /// The parsed endpoint URL.
    pub fn url(&self) -> Result<Url> {
        Url::parse(&self.rpc_url).with_context(|| format!("Invalid RPC URL: {}", self.rpc_url))
    }
}

/// Top-level configuration: where artifacts and address books live, and how
/// to reach each network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_addresses_dir")]
    pub addresses_dir: PathBuf,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkProfile>,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACTS_DIR)
}

fn default_addresses_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ADDRESSES_DIR)
}

impl Default for DeployConfig {
    fn default() -> Self {
        let networks = [
            (
                "besu",
                // Gas-free network: huge limit, zero price.
                NetworkProfile::new("http://localhost:8454", 112233)
                    .with_gas(0x1f_ffff_ffff_fffe)
                    .with_gas_price(0),
            ),
            (
                "eth_sepolia",
                NetworkProfile::new("https://eth-sepolia.g.alchemy.com/v2/API_KEY", 11155111)
                    .with_gas(TESTNET_GAS_LIMIT)
                    .with_confirmations(1),
            ),
            (
                "eth_optimism",
                NetworkProfile::new("https://opt-sepolia.g.alchemy.com/v2/API_KEY", 11155420)
                    .with_gas(TESTNET_GAS_LIMIT)
                    .with_confirmations(1),
            ),
            (
                "amoy",
                NetworkProfile::new("https://polygon-amoy.g.alchemy.com/v2/API_KEY", 80002)
                    .with_gas(TESTNET_GAS_LIMIT)
                    .with_confirmations(1),
            ),
            (
                "shimmer",
                NetworkProfile::new("https://json-rpc.evm.testnet.shimmer.network/", 1073)
                    .with_gas(TESTNET_GAS_LIMIT)
                    .with_confirmations(1),
            ),
        ];

        Self {
            artifacts_dir: default_artifacts_dir(),
            addresses_dir: default_addresses_dir(),
            networks: networks
                .into_iter()
                .map(|(name, profile)| (name.to_string(), profile))
                .collect(),
        }
    }
}

impl DeployConfig {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deploy config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Deploy.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file or directory not found: {}",
                path.display()
            );
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Profile for `network`, with the RPC URL taken from
    /// `ECTSS_<NETWORK>_RPC_URL` when that variable is set.
    pub fn profile(&self, network: &str) -> Result<NetworkProfile> {
        let mut profile = self.networks.get(network).cloned().with_context(|| {
            format!(
                "Unknown network `{network}`, configured networks: {}",
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })?;

        let var = rpc_url_env_var(network);
        if let Ok(rpc_url) = std::env::var(&var) {
            tracing::debug!(network, var = %var, "RPC URL overridden from environment");
            profile.rpc_url = rpc_url;
        }

        Ok(profile)
    }
}

/// `ECTSS_ETH_SEPOLIA_RPC_URL` for `eth_sepolia`.
pub fn rpc_url_env_var(network: &str) -> String {
    format!(
        "ECTSS_{}_RPC_URL",
        network.to_ascii_uppercase().replace('-', "_")
    )
}
