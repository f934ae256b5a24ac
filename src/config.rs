//! Configuration management for the swap runner
//!
//! Loads configuration from a TOML file with environment variable substitution.

use crate::signer::SecretPhrase;

use anyhow::{Context, Result};
use ethers::types::Address;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Largest decimals value accepted for a swap asset
const MAX_DECIMALS: u32 = 36;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub secret: SecretConfig,
    pub substrate: SubstrateChainConfig,
    pub evm: EvmChainConfig,
    pub planner: PlannerConfig,
    pub swap: SwapConfig,
    pub legs: LegsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Fixed wait after the outbound leg and after the swap. A heuristic for
    /// cross-chain message delivery, not a finality guarantee.
    #[serde(default = "default_settle_wait_secs")]
    pub settle_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretConfig {
    pub phrase: SecretPhrase,
}

/// Chain A: Substrate family, signs offline
#[derive(Debug, Clone, Deserialize)]
pub struct SubstrateChainConfig {
    /// Identifier understood by the transfer planner
    pub key: String,
    pub name: String,
    /// SS58 network prefix used for address encoding
    pub ss58_format: u16,
}

/// Chain B: EVM family, broadcasts over WebSocket
#[derive(Debug, Clone, Deserialize)]
pub struct EvmChainConfig {
    pub key: String,
    pub name: String,
    pub chain_id: u64,
    pub ws_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    pub url: String,
    #[serde(default = "default_planner_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    pub router_address: String,
    /// Seconds added to submission time to form the swap deadline
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    pub amount_in: Decimal,
    pub input_decimals: u32,
    pub min_output: Decimal,
    pub output_decimals: u32,
    /// Token addresses in hop order, input first
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegsConfig {
    /// Chain A -> chain B
    pub outbound: LegConfig,
    /// Chain B -> chain A
    pub inbound: LegConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegConfig {
    pub asset: String,
    pub amount: Decimal,
}

fn default_settle_wait_secs() -> u64 {
    20
}

fn default_planner_timeout_secs() -> u64 {
    30
}

fn default_deadline_secs() -> u64 {
    1200
}

impl Settings {
    /// Load settings from the file named by `RUNNER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("RUNNER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::from_path(&config_path)
    }

    /// Load settings from a specific file
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.secret.phrase.check_shape()?;

        if self.evm.ws_url.is_empty() {
            anyhow::bail!("Chain {} has no WebSocket URL configured", self.evm.name);
        }

        reqwest::Url::parse(&self.planner.url)
            .with_context(|| format!("Invalid planner URL: {}", self.planner.url))?;

        self.router_address()?;
        let path = self.swap_path()?;
        if path.len() < 2 {
            anyhow::bail!("Swap path needs at least two tokens, got {}", path.len());
        }

        if self.swap.deadline_secs == 0 {
            anyhow::bail!("swap.deadline_secs must be positive");
        }
        for (field, decimals) in [
            ("input_decimals", self.swap.input_decimals),
            ("output_decimals", self.swap.output_decimals),
        ] {
            if decimals > MAX_DECIMALS {
                anyhow::bail!("swap.{} = {} exceeds {}", field, decimals, MAX_DECIMALS);
            }
        }

        for (field, amount) in [
            ("swap.amount_in", self.swap.amount_in),
            ("swap.min_output", self.swap.min_output),
            ("legs.outbound.amount", self.legs.outbound.amount),
            ("legs.inbound.amount", self.legs.inbound.amount),
        ] {
            if amount <= Decimal::ZERO {
                anyhow::bail!("{} must be positive, got {}", field, amount);
            }
        }

        if self.runner.settle_wait_secs == 0 {
            tracing::warn!("runner.settle_wait_secs is 0 - legs will not wait for delivery");
        }

        Ok(())
    }

    /// Router contract address
    pub fn router_address(&self) -> Result<Address> {
        self.swap
            .router_address
            .parse()
            .with_context(|| format!("Invalid router address: {}", self.swap.router_address))
    }

    /// Swap hop path as addresses
    pub fn swap_path(&self) -> Result<Vec<Address>> {
        self.swap
            .path
            .iter()
            .map(|token| {
                token
                    .parse::<Address>()
                    .with_context(|| format!("Invalid token address in swap path: {}", token))
            })
            .collect()
    }

    pub fn settle_wait(&self) -> Duration {
        Duration::from_secs(self.runner.settle_wait_secs)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const SAMPLE: &str = r#"
[runner]
settle_wait_secs = 20

[logging]
level = "info"
json = false

[secret]
phrase = "test test test test test test test test test test test junk"

[substrate]
key = "polkadotAssetHub"
name = "Polkadot Asset Hub"
ss58_format = 0

[evm]
key = "moonbeam"
name = "Moonbeam"
chain_id = 1284
ws_url = "wss://wss.api.moonbeam.network"

[planner]
url = "http://127.0.0.1:4100"

[swap]
router_address = "0xe6d0ED3759709b743707DcfeCAe39BC180C981fe"
amount_in = "15"
input_decimals = 6
min_output = "2"
output_decimals = 10
path = [
  "0xffffffffea09fb06d082fd1275cd48b191cbcd1d",
  "0xffffffff1fcacbd218edc0eba20fc2308c778080",
]

[legs.outbound]
asset = "usdt"
amount = "15"

[legs.inbound]
asset = "dot"
amount = "1"
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_sample_config_parses() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        assert_eq!(settings.swap.deadline_secs, 1200);
        assert_eq!(settings.planner.timeout_secs, 30);
        assert_eq!(settings.settle_wait(), Duration::from_secs(20));
        assert_eq!(settings.swap_path().unwrap().len(), 2);
        assert_eq!(settings.legs.outbound.amount, Decimal::from(15));
    }

    #[test]
    fn test_phrase_from_environment() {
        env::set_var("RUNNER_TEST_PHRASE", "test test test test test test test test test test test junk");
        let input = SAMPLE.replace(
            "phrase = \"test test test test test test test test test test test junk\"",
            "phrase = \"${RUNNER_TEST_PHRASE}\"",
        );
        let settings = Settings::from_toml(&input).unwrap();
        assert_eq!(settings.secret.phrase.expose().split_whitespace().count(), 12);
    }

    #[test]
    fn test_rejects_short_path() {
        let input = SAMPLE.replace(
            "  \"0xffffffff1fcacbd218edc0eba20fc2308c778080\",\n",
            "",
        );
        let err = Settings::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("at least two tokens"));
    }

    #[test]
    fn test_rejects_bad_router_address() {
        let input = SAMPLE.replace("0xe6d0ED3759709b743707DcfeCAe39BC180C981fe", "0x1234");
        assert!(Settings::from_toml(&input).is_err());
    }

    #[test]
    fn test_rejects_empty_phrase() {
        let input = SAMPLE.replace(
            "test test test test test test test test test test test junk",
            "",
        );
        assert!(Settings::from_toml(&input).is_err());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let input = SAMPLE.replace("amount = \"1\"", "amount = \"0\"");
        let err = Settings::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("legs.inbound.amount"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::from_path(file.path()).unwrap();
        assert_eq!(settings.evm.chain_id, 1284);
        assert_eq!(settings.substrate.ss58_format, 0);
    }
}
