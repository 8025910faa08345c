//! Ledger transaction submission
//!
//! An executed swap action resolves to a ledger action payload; the wallets
//! dispatch it to the submitter for the ledger it targets. Submitters own the
//! full submission discipline: ordering-token (nonce) assignment under the
//! account lock where the ledger requires it, signing, broadcast, and waiting
//! for one confirmation.

pub mod bitcoin;
pub mod ethereum;
pub mod lock;

use crate::config::Settings;
use crate::error::{FollowerError, FollowerResult};

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// Proof of a submitted, confirmed chain transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// The ledger's transaction identifier.
    pub tx_id: String,
}

/// What the daemon answers when an action is executed: the chain transaction
/// the party must now perform, tagged by ledger and operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum LedgerActionPayload {
    BitcoinSendAmountToAddress {
        to: String,
        /// Satoshis, as a decimal string.
        amount: String,
        network: String,
    },
    BitcoinBroadcastSignedTransaction {
        hex: String,
        network: String,
    },
    EthereumDeployContract {
        data: String,
        amount: String,
        gas_limit: String,
        chain_id: u64,
    },
    EthereumCallContract {
        contract_address: String,
        #[serde(default)]
        data: Option<String>,
        gas_limit: String,
        chain_id: u64,
    },
}

impl LedgerActionPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerActionPayload::BitcoinSendAmountToAddress { .. } => {
                "bitcoin-send-amount-to-address"
            }
            LedgerActionPayload::BitcoinBroadcastSignedTransaction { .. } => {
                "bitcoin-broadcast-signed-transaction"
            }
            LedgerActionPayload::EthereumDeployContract { .. } => "ethereum-deploy-contract",
            LedgerActionPayload::EthereumCallContract { .. } => "ethereum-call-contract",
        }
    }
}

/// The seam between the orchestrator and the ledger wallets.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExecuteLedgerAction: Send + Sync {
    async fn execute(&self, payload: &LedgerActionPayload) -> FollowerResult<TransactionReceipt>;
}

/// The per-ledger submitters available to this party.
pub struct Wallets {
    ethereum: Option<Arc<ethereum::EthereumSubmitter<ethereum::JsonRpcChain>>>,
    bitcoin: Option<Arc<bitcoin::BitcoinSubmitter>>,
}

impl Wallets {
    pub fn new(
        ethereum: Option<Arc<ethereum::EthereumSubmitter<ethereum::JsonRpcChain>>>,
        bitcoin: Option<Arc<bitcoin::BitcoinSubmitter>>,
    ) -> Self {
        Self { ethereum, bitcoin }
    }

    /// Build the wallet set from configuration, skipping unconfigured ledgers.
    pub fn from_settings(settings: &Settings) -> FollowerResult<Self> {
        let ethereum = settings
            .ethereum
            .as_ref()
            .map(|config| {
                let chain = ethereum::JsonRpcChain::new(&config.rpc_url)?;
                let wallet = ethereum::wallet_from_env(&config.private_key_env)?;
                std::fs::create_dir_all(&config.lock_dir).map_err(|e| {
                    FollowerError::Config(format!(
                        "cannot create lock dir {}: {}",
                        config.lock_dir.display(),
                        e
                    ))
                })?;
                // Lock scope is the funding account, shared by any process
                // submitting from the same key.
                let account = format!("{:#x}", ethers::signers::Signer::address(&wallet));
                let submitter = ethereum::EthereumSubmitter::new(
                    chain,
                    wallet,
                    config.chain_id,
                    lock::AccountLock::new(&config.lock_dir, &account).with_retries(
                        config.lock_max_attempts,
                        Duration::from_millis(config.lock_base_delay_ms),
                    ),
                );
                Ok::<_, FollowerError>(Arc::new(submitter))
            })
            .transpose()?;

        let bitcoin = settings
            .bitcoin
            .as_ref()
            .map(|config| {
                let submitter = bitcoin::BitcoinSubmitter::new(&config.rpc_url)?;
                Ok::<_, FollowerError>(Arc::new(submitter))
            })
            .transpose()?;

        Ok(Self { ethereum, bitcoin })
    }
}

#[async_trait]
impl ExecuteLedgerAction for Wallets {
    async fn execute(&self, payload: &LedgerActionPayload) -> FollowerResult<TransactionReceipt> {
        match payload {
            LedgerActionPayload::EthereumDeployContract { .. }
            | LedgerActionPayload::EthereumCallContract { .. } => self
                .ethereum
                .as_ref()
                .ok_or_else(|| FollowerError::UnsupportedPayload {
                    kind: payload.kind().to_string(),
                })?
                .execute(payload)
                .await,
            LedgerActionPayload::BitcoinSendAmountToAddress { .. }
            | LedgerActionPayload::BitcoinBroadcastSignedTransaction { .. } => self
                .bitcoin
                .as_ref()
                .ok_or_else(|| FollowerError::UnsupportedPayload {
                    kind: payload.kind().to_string(),
                })?
                .execute(payload)
                .await,
        }
    }
}
