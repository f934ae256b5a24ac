//! Signer module - derives both chain identities from one mnemonic
//!
//! - Substrate (chain A): sr25519 keypair from the mnemonic's mini secret,
//!   SS58 address, offline signing only
//! - EVM (chain B): secp256k1 key at `m/44'/60'/0'/0/0`, bound to a live
//!   WebSocket connection for broadcasting

pub mod evm;
pub mod substrate;

pub use substrate::SubstrateSigner;

use crate::config::EvmChainConfig;
use crate::error::{RunnerError, RunnerResult};

use bip39::{Language, Mnemonic};
use ethers::prelude::*;
use ethers::providers::{Provider, Ws};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

/// Mnemonic held in memory for the duration of the run
#[derive(Clone)]
pub struct SecretPhrase(Zeroizing<String>);

impl SecretPhrase {
    pub fn new(phrase: impl Into<String>) -> Self {
        Self(Zeroizing::new(phrase.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Cheap structural check done at config time; checksum is verified on derivation
    pub fn check_shape(&self) -> RunnerResult<()> {
        let words = self.0.split_whitespace().count();
        if ![12, 15, 18, 21, 24].contains(&words) {
            return Err(RunnerError::InvalidPhrase(format!(
                "expected 12, 15, 18, 21 or 24 words, got {}",
                words
            )));
        }
        Ok(())
    }

    fn parse(&self) -> RunnerResult<Mnemonic> {
        Mnemonic::parse_in(Language::English, self.expose())
            .map_err(|e| RunnerError::InvalidPhrase(e.to_string()))
    }
}

impl fmt::Debug for SecretPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretPhrase(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for SecretPhrase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretPhrase::new)
    }
}

/// Key material derived from a phrase, before any network binding
pub struct DerivedKeys {
    pub substrate: SubstrateSigner,
    pub evm: LocalWallet,
}

/// Derive both identities. Pure: the same phrase always yields the same keys.
pub fn derive_keys(phrase: &SecretPhrase, ss58_format: u16) -> RunnerResult<DerivedKeys> {
    let mnemonic = phrase.parse()?;

    let substrate = SubstrateSigner::from_entropy(&mnemonic.to_entropy(), ss58_format)?;
    let evm = evm::wallet_from_seed(&mnemonic.to_seed(""))?;

    Ok(DerivedKeys { substrate, evm })
}

/// Addresses of the derived pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPair {
    /// SS58 address on chain A
    pub substrate: String,
    /// Hex address on chain B
    pub evm: Address,
}

/// Both signing handles for the run
pub struct SignerPair<M: Middleware = Provider<Ws>> {
    pub substrate: SubstrateSigner,
    pub evm: Arc<SignerMiddleware<M, LocalWallet>>,
}

impl<M: Middleware> SignerPair<M> {
    /// Bind derived keys to a chain-B provider
    pub fn bind(keys: DerivedKeys, provider: M, chain_id: u64) -> Self {
        let wallet = keys.evm.with_chain_id(chain_id);
        Self {
            substrate: keys.substrate,
            evm: Arc::new(SignerMiddleware::new(provider, wallet)),
        }
    }

    pub fn accounts(&self) -> AccountPair {
        AccountPair {
            substrate: self.substrate.address().to_string(),
            evm: self.evm.address(),
        }
    }
}

/// Derive both signers and open the chain-B connection shared by the run
pub async fn derive_signers(
    phrase: &SecretPhrase,
    ss58_format: u16,
    evm_config: &EvmChainConfig,
) -> RunnerResult<SignerPair> {
    let keys = derive_keys(phrase, ss58_format)?;
    let provider = evm::connect(evm_config).await?;
    let signers = SignerPair::bind(keys, provider, evm_config.chain_id);

    debug!("Bound EVM signer {:?}", signers.evm.address());

    Ok(signers)
}
