//! Deployment configuration: which chain and which contracts to talk to.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::schema::codec::parse_address;

/// Base Sepolia
pub const DEFAULT_CHAIN_ID: u64 = 84532;

/// Attestation predeploys on OP-stack chains
pub const DEFAULT_SCHEMA_REGISTRY_ADDRESS: &str = "0x4200000000000000000000000000000000000020";
pub const DEFAULT_EAS_ADDRESS: &str = "0x4200000000000000000000000000000000000021";

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// Errors while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} is not set or invalid: {value:?}")]
    InvalidAddress { var: &'static str, value: String },

    #[error("CHAIN_ID is not a number: {0:?}")]
    InvalidChainId(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Addresses and endpoints for one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub schema_registry_address: String,
    pub eas_address: String,
    /// Schema resolver used when registering schemas
    pub resolver_address: Option<String>,
    /// Deployed vault contract
    pub smart_vault_address: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            schema_registry_address: DEFAULT_SCHEMA_REGISTRY_ADDRESS.to_string(),
            eas_address: DEFAULT_EAS_ADDRESS.to_string(),
            resolver_address: None,
            smart_vault_address: None,
        }
    }
}

impl VaultConfig {
    /// Load from process environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(chain_id) = lookup("CHAIN_ID") {
            config.chain_id = chain_id
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidChainId(chain_id.clone()))?;
        }
        if let Some(url) = lookup("RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(address) = lookup("SCHEMA_REGISTRY_ADDRESS") {
            config.schema_registry_address = address;
        }
        if let Some(address) = lookup("EAS_ADDRESS") {
            config.eas_address = address;
        }
        config.resolver_address = lookup("RESOLVER_ADDRESS").or(config.resolver_address);
        config.smart_vault_address = lookup("SMART_VAULT_ADDRESS").or(config.smart_vault_address);

        config.validate()?;
        debug!("Loaded config for chain {}", config.chain_id);
        Ok(config)
    }

    /// Load from a JSON file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every configured address
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_address("SCHEMA_REGISTRY_ADDRESS", &self.schema_registry_address)?;
        check_address("EAS_ADDRESS", &self.eas_address)?;
        if let Some(address) = &self.resolver_address {
            check_address("RESOLVER_ADDRESS", address)?;
        }
        if let Some(address) = &self.smart_vault_address {
            check_address("SMART_VAULT_ADDRESS", address)?;
        }
        Ok(())
    }
}

fn check_address(var: &'static str, value: &str) -> Result<(), ConfigError> {
    match parse_address(value.trim()) {
        Some(_) => Ok(()),
        None => Err(ConfigError::InvalidAddress {
            var,
            value: value.to_string(),
        }),
    }
}
