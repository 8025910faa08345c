//! Bitcoin transaction submitter
//!
//! Talks to a bitcoind-style wallet over JSON-RPC. UTXO ledgers have no
//! account nonce, so no lock discipline applies; the submitter broadcasts and
//! then polls the wallet until the transaction has one confirmation.

use crate::error::{FollowerError, FollowerResult};
use crate::ledger::{LedgerActionPayload, TransactionReceipt};
use crate::poll::poll_until;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_CONFIRMATION_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Submits Bitcoin transactions through a wallet RPC endpoint.
pub struct BitcoinSubmitter {
    http: reqwest::Client,
    rpc_url: reqwest::Url,
    confirmation_interval: Duration,
    confirmation_timeout: Duration,
}

impl BitcoinSubmitter {
    pub fn new(rpc_url: &str) -> FollowerResult<Self> {
        let rpc_url = rpc_url
            .parse()
            .map_err(|e| FollowerError::Config(format!("invalid bitcoin RPC url {}: {}", rpc_url, e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            rpc_url,
            confirmation_interval: DEFAULT_CONFIRMATION_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        })
    }

    pub fn with_confirmation(mut self, interval: Duration, timeout: Duration) -> Self {
        self.confirmation_interval = interval;
        self.confirmation_timeout = timeout;
        self
    }

    pub async fn execute(&self, payload: &LedgerActionPayload) -> FollowerResult<TransactionReceipt> {
        let txid = match payload {
            LedgerActionPayload::BitcoinSendAmountToAddress { to, amount, network } => {
                let btc = sats_to_btc(amount)?;
                debug!(to = %to, amount = %btc, network = %network, "sending to address");
                self.call("sendtoaddress", vec![json!(to), json!(btc)]).await?
            }
            LedgerActionPayload::BitcoinBroadcastSignedTransaction { hex, network } => {
                debug!(network = %network, "broadcasting signed transaction");
                self.call("sendrawtransaction", vec![json!(hex)]).await?
            }
            other => {
                return Err(FollowerError::UnsupportedPayload {
                    kind: other.kind().to_string(),
                })
            }
        };

        let txid = txid
            .as_str()
            .ok_or_else(|| FollowerError::Ledger("RPC returned a non-string txid".to_string()))?
            .to_string();

        self.wait_for_confirmation(txid).await
    }

    async fn wait_for_confirmation(&self, txid: String) -> FollowerResult<TransactionReceipt> {
        let awaiting = format!("confirmation of transaction {}", txid);

        poll_until(
            &awaiting,
            self.confirmation_interval,
            self.confirmation_timeout,
            {
                let txid = txid.clone();
                move || {
                    let txid = txid.clone();
                    async move {
                        let tx = self.call("gettransaction", vec![json!(txid)]).await?;
                        Ok(tx.get("confirmations").and_then(Value::as_i64).unwrap_or(0))
                    }
                }
            },
            |confirmations| *confirmations >= 1,
        )
        .await?;

        info!(tx = %txid, "transaction confirmed");
        Ok(TransactionReceipt { tx_id: txid })
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> FollowerResult<Value> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: "swap-follower",
            method,
            params,
        };

        let response = self
            .http
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| FollowerError::Ledger(format!("bitcoin RPC '{}' failed: {}", method, e)))?;

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| FollowerError::Ledger(format!("bitcoin RPC '{}' returned malformed body: {}", method, e)))?;

        if let Some(error) = body.error {
            return Err(FollowerError::Ledger(format!(
                "bitcoin RPC '{}' error {}: {}",
                method, error.code, error.message
            )));
        }

        body.result
            .ok_or_else(|| FollowerError::Ledger(format!("bitcoin RPC '{}' returned no result", method)))
    }
}

/// Convert a satoshi decimal string into the BTC string bitcoind expects.
fn sats_to_btc(amount: &str) -> FollowerResult<String> {
    let sats: u64 = amount
        .parse()
        .map_err(|e| FollowerError::Ledger(format!("invalid satoshi amount '{}': {}", amount, e)))?;
    Ok(format!("{}.{:08}", sats / 100_000_000, sats % 100_000_000))
}
