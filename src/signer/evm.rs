//! EVM-family identity and the WebSocket connection it broadcasts over

use crate::config::EvmChainConfig;
use crate::error::{RunnerError, RunnerResult};

use coins_bip32::path::DerivationPath;
use ethers::prelude::*;
use ethers::providers::{Provider, Ws};
use std::time::Duration;
use tracing::{debug, info};

/// BIP-44 path for the first account of coin type 60
pub const EVM_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Derive the chain-B wallet from a 64-byte BIP-39 seed
pub fn wallet_from_seed(seed: &[u8]) -> RunnerResult<LocalWallet> {
    use coins_bip32::prelude::*;

    let path = EVM_DERIVATION_PATH
        .parse::<DerivationPath>()
        .map_err(|e| RunnerError::Wallet(format!("Invalid derivation path: {}", e)))?;

    let master_key = XPriv::root_from_seed(seed, None)
        .map_err(|e| RunnerError::Wallet(format!("Failed to derive master key: {}", e)))?;
    let derived = master_key
        .derive_path(&path)
        .map_err(|e| RunnerError::Wallet(format!("Failed to derive {}: {}", EVM_DERIVATION_PATH, e)))?;

    let signing_key: &SigningKey = derived.as_ref();
    let secret = signing_key.to_bytes();

    LocalWallet::from_bytes(secret.as_slice())
        .map_err(|e| RunnerError::Wallet(format!("Invalid private key: {}", e)))
}

/// Open the chain-B WebSocket connection and check it serves the configured chain
pub async fn connect(config: &EvmChainConfig) -> RunnerResult<Provider<Ws>> {
    let provider = Provider::<Ws>::connect(&config.ws_url)
        .await
        .map_err(|e| RunnerError::Network {
            endpoint: config.name.clone(),
            message: format!("WebSocket connection failed: {}", e),
        })?
        .interval(Duration::from_millis(500));

    let reported = provider
        .get_chainid()
        .await
        .map_err(|e| RunnerError::Network {
            endpoint: config.name.clone(),
            message: e.to_string(),
        })?
        .as_u64();

    if reported != config.chain_id {
        return Err(RunnerError::Config(format!(
            "{} endpoint reports chain id {}, expected {}",
            config.name, reported, config.chain_id
        )));
    }

    debug!("Connected to {} at {}", config.name, config.ws_url);
    info!("WebSocket connected for {} (chain {})", config.name, config.chain_id);

    Ok(provider)
}
