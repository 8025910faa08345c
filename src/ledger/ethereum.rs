//! Ethereum transaction submitter
//!
//! Account-based ledgers order transactions by a per-account nonce, so nonce
//! assignment, signing and broadcast happen under the cross-process account
//! lock. The lock is released before waiting for inclusion: the node orders
//! same-account transactions by nonce, so unrelated confirmations need not be
//! serialized.

use crate::error::{FollowerError, FollowerResult};
use crate::ledger::lock::AccountLock;
use crate::ledger::{LedgerActionPayload, TransactionReceipt};
use crate::poll::poll_until;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockNumber, Bytes, TransactionRequest, H256, U256};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_CONFIRMATION_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

/// RPC capability the submitter needs from an Ethereum node.
#[async_trait]
pub trait EthereumChain: Send + Sync {
    /// The account's transaction count including pending transactions.
    async fn pending_nonce(&self, account: Address) -> FollowerResult<U256>;
    async fn gas_price(&self) -> FollowerResult<U256>;
    /// Broadcast a signed raw transaction, returning its hash.
    async fn broadcast(&self, raw: Bytes) -> FollowerResult<H256>;
    /// `None` while not yet included, otherwise whether the transaction
    /// succeeded.
    async fn transaction_status(&self, hash: H256) -> FollowerResult<Option<bool>>;
}

/// `EthereumChain` over a JSON-RPC endpoint.
pub struct JsonRpcChain {
    provider: Provider<Http>,
}

impl JsonRpcChain {
    pub fn new(url: &str) -> FollowerResult<Self> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| FollowerError::Config(format!("invalid ethereum RPC url {}: {}", url, e)))?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl EthereumChain for JsonRpcChain {
    async fn pending_nonce(&self, account: Address) -> FollowerResult<U256> {
        self.provider
            .get_transaction_count(account, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| FollowerError::Ledger(format!("nonce lookup failed: {}", e)))
    }

    async fn gas_price(&self) -> FollowerResult<U256> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| FollowerError::Ledger(format!("gas price lookup failed: {}", e)))
    }

    async fn broadcast(&self, raw: Bytes) -> FollowerResult<H256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| FollowerError::Ledger(format!("broadcast failed: {}", e)))?;
        Ok(pending.tx_hash())
    }

    async fn transaction_status(&self, hash: H256) -> FollowerResult<Option<bool>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| FollowerError::Ledger(format!("receipt lookup failed: {}", e)))?;
        Ok(receipt.map(|r| r.status.map(|s| s.as_u64() == 1).unwrap_or(true)))
    }
}

/// Load the signing key from the environment variable named in the config.
pub fn wallet_from_env(var: &str) -> FollowerResult<LocalWallet> {
    let key = std::env::var(var)
        .map_err(|_| FollowerError::Wallet(format!("environment variable {} not set", var)))?;
    key.parse::<LocalWallet>()
        .map_err(|e| FollowerError::Wallet(format!("invalid private key in {}: {}", var, e)))
}

/// Submits transactions from one funding account with strict nonce ordering.
pub struct EthereumSubmitter<C> {
    chain: C,
    wallet: LocalWallet,
    chain_id: u64,
    lock: AccountLock,
    confirmation_interval: Duration,
    confirmation_timeout: Duration,
}

impl<C: EthereumChain> EthereumSubmitter<C> {
    pub fn new(chain: C, wallet: LocalWallet, chain_id: u64, lock: AccountLock) -> Self {
        Self {
            chain,
            wallet: wallet.with_chain_id(chain_id),
            chain_id,
            lock,
            confirmation_interval: DEFAULT_CONFIRMATION_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_confirmation(mut self, interval: Duration, timeout: Duration) -> Self {
        self.confirmation_interval = interval;
        self.confirmation_timeout = timeout;
        self
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub async fn execute(&self, payload: &LedgerActionPayload) -> FollowerResult<TransactionReceipt> {
        let tx = match payload {
            LedgerActionPayload::EthereumDeployContract {
                data,
                amount,
                gas_limit,
                ..
            } => deploy_contract_tx(data, amount, gas_limit)?,
            LedgerActionPayload::EthereumCallContract {
                contract_address,
                data,
                gas_limit,
                ..
            } => call_contract_tx(contract_address, data.as_deref(), gas_limit)?,
            other => {
                return Err(FollowerError::UnsupportedPayload {
                    kind: other.kind().to_string(),
                })
            }
        };

        self.submit(tx).await
    }

    /// Assign the next nonce under the account lock, sign, broadcast, then
    /// wait for one confirmation.
    pub async fn submit(&self, mut tx: TypedTransaction) -> FollowerResult<TransactionReceipt> {
        let gas_price = self.chain.gas_price().await?;
        tx.set_chain_id(self.chain_id);
        tx.set_from(self.wallet.address());
        tx.set_gas_price(gas_price);

        // Nonce read and broadcast must not interleave with another caller:
        // the next pending-count read has to include this transaction.
        let guard = self.lock.acquire().await?;
        let nonce = self.chain.pending_nonce(self.wallet.address()).await?;
        tx.set_nonce(nonce);
        let signature = self
            .wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| FollowerError::Wallet(e.to_string()))?;
        let hash = self.chain.broadcast(tx.rlp_signed(&signature)).await?;
        drop(guard);

        debug!(nonce = %nonce, tx = ?hash, "transaction broadcast, awaiting inclusion");
        self.wait_for_inclusion(hash).await
    }

    async fn wait_for_inclusion(&self, hash: H256) -> FollowerResult<TransactionReceipt> {
        let tx_id = format!("{:#x}", hash);
        let chain = &self.chain;

        let status = poll_until(
            &format!("inclusion of transaction {}", tx_id),
            self.confirmation_interval,
            self.confirmation_timeout,
            move || async move { chain.transaction_status(hash).await },
            Option::is_some,
        )
        .await?;

        match status {
            Some(true) => {
                info!(tx = %tx_id, "transaction confirmed");
                Ok(TransactionReceipt { tx_id })
            }
            _ => Err(FollowerError::TransactionRejected { tx_id }),
        }
    }
}

fn parse_quantity(value: &str) -> FollowerResult<U256> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(value).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| FollowerError::Ledger(format!("invalid quantity '{}': {}", value, e)))
}

fn parse_data(data: &str) -> FollowerResult<Bytes> {
    data.parse::<Bytes>()
        .map_err(|e| FollowerError::Ledger(format!("invalid transaction data: {}", e)))
}

fn deploy_contract_tx(data: &str, amount: &str, gas_limit: &str) -> FollowerResult<TypedTransaction> {
    // No `to`: contract creation.
    let request = TransactionRequest::new()
        .data(parse_data(data)?)
        .value(parse_quantity(amount)?)
        .gas(parse_quantity(gas_limit)?);
    Ok(request.into())
}

fn call_contract_tx(
    contract_address: &str,
    data: Option<&str>,
    gas_limit: &str,
) -> FollowerResult<TypedTransaction> {
    let to: Address = contract_address
        .parse()
        .map_err(|e| FollowerError::Ledger(format!("invalid contract address: {}", e)))?;

    let mut request = TransactionRequest::new().to(to).gas(parse_quantity(gas_limit)?);
    if let Some(data) = data {
        request = request.data(parse_data(data)?);
    }
    Ok(request.into())
}
