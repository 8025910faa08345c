//! Action-following orchestrator
//!
//! One `Follower` per local party. Each `assert_and_execute_next_action` call
//! runs the two-phase wait: first for the daemon to advertise the expected
//! action (its intent to let the party act), then for the matching event to
//! appear in the swap's event sequence (its observation that the chain effect
//! landed). Both phases are bounded and independently cancellable.

use crate::client::SwapClient;
use crate::error::{FollowerError, FollowerResult};
use crate::ledger::{ExecuteLedgerAction, TransactionReceipt};
use crate::poll::poll_until;
use crate::swap::{resolver, ActionName, ProtocolKind, Role, Swap};

use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Tuning for the follower's bounded waits.
#[derive(Debug, Clone)]
pub struct FollowerTuning {
    pub poll_interval: Duration,
    pub action_timeout: Duration,
    pub event_timeout: Duration,
}

impl Default for FollowerTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            action_timeout: Duration::from_secs(20),
            event_timeout: Duration::from_secs(30),
        }
    }
}

/// Drives one party's side of a swap by following daemon-advertised actions.
pub struct Follower {
    client: SwapClient,
    wallets: Arc<dyn ExecuteLedgerAction>,
    tuning: FollowerTuning,
}

impl Follower {
    pub fn new(
        client: SwapClient,
        wallets: Arc<dyn ExecuteLedgerAction>,
        tuning: FollowerTuning,
    ) -> Self {
        Self {
            client,
            wallets,
            tuning,
        }
    }

    /// Poll `/peers` until the daemon reports `peer_id`.
    pub async fn wait_for_peer(&self, peer_id: &str) -> FollowerResult<()> {
        let client = &self.client;
        poll_until(
            &format!("peer {} to appear", peer_id),
            self.tuning.poll_interval,
            self.tuning.action_timeout,
            move || async move { client.peers().await },
            |peers| peers.iter().any(|peer| peer.id == peer_id),
        )
        .await?;
        Ok(())
    }

    /// Poll `/swaps` until a swap shows up, returning its locator.
    pub async fn wait_for_swap(&self) -> FollowerResult<Url> {
        let client = &self.client;
        let swaps = poll_until(
            "an active swap to appear",
            self.tuning.poll_interval,
            self.tuning.action_timeout,
            move || async move { client.active_swaps().await },
            |swaps| !swaps.is_empty(),
        )
        .await?;

        swaps
            .into_iter()
            .next()
            .ok_or_else(|| FollowerError::Timeout {
                awaiting: "an active swap to appear".to_string(),
            })
    }

    /// Fails unless the daemon reports no active swaps.
    pub async fn assert_no_active_swaps(&self) -> FollowerResult<()> {
        let swaps = self.client.active_swaps().await?;
        if swaps.is_empty() {
            Ok(())
        } else {
            Err(FollowerError::ActiveSwapsRemain { count: swaps.len() })
        }
    }

    /// Fails unless the order's full quantity has traded and settled.
    pub async fn assert_order_closed(&self, order_url: &Url) -> FollowerResult<()> {
        let order = self.client.fetch_order(order_url).await?;
        if order.is_fully_closed() {
            Ok(())
        } else {
            Err(FollowerError::OrderState(format!(
                "expected closed == {}, got open={} closed={} settling={} failed={} cancelled={}",
                order.quantity.value,
                order.state.open,
                order.state.closed,
                order.state.settling,
                order.state.failed,
                order.state.cancelled,
            )))
        }
    }

    /// Wait for the expected action, execute it, then wait for the resolved
    /// event to appear in the swap's event sequence.
    pub async fn assert_and_execute_next_action(
        &self,
        swap_url: &Url,
        expected: ActionName,
    ) -> FollowerResult<TransactionReceipt> {
        let action = {
            let client = &self.client;
            let result = poll_until(
                &format!("action '{}' on {}", expected, swap_url),
                self.tuning.poll_interval,
                self.tuning.action_timeout,
                move || {
                    let url = swap_url.clone();
                    async move {
                        let swap = client.fetch_swap(&url).await?;
                        swap.find_action(expected).map(|action| action.clone())
                    }
                },
                |_| true,
            )
            .await;

            match result {
                Ok(action) => action,
                Err(FollowerError::Timeout { .. }) => {
                    return Err(FollowerError::ActionTimeout {
                        action: expected.to_string(),
                    })
                }
                Err(e) => return Err(e),
            }
        };

        info!(action = %expected, swap = %swap_url, "executing action");
        let payload = self.client.resolve_action(&action).await?;
        let receipt = self.wallets.execute(&payload).await?;
        debug!(tx = %receipt.tx_id, "ledger transaction confirmed");

        // Action availability reflects the daemon's intent; event confirmation
        // reflects its observation of the chain. The two waits stay separate.
        let swap = self.client.fetch_swap(swap_url).await?;
        let properties = &swap.properties;
        let expected_event = resolver::expected_event(
            properties.role,
            expected,
            properties.alpha.kind(),
            properties.beta.kind(),
        );

        let Some(event) = expected_event else {
            debug!(action = %expected, "no observable event for this action");
            return Ok(receipt);
        };

        let wait = {
            let client = &self.client;
            poll_until(
                &format!("event '{}' on {}", event, swap_url),
                self.tuning.poll_interval,
                self.tuning.event_timeout,
                move || {
                    let url = swap_url.clone();
                    async move { client.fetch_swap(&url).await }
                },
                |swap: &Swap| swap.has_event(event),
            )
            .await
        };

        match wait {
            Ok(_) => {
                info!(event = %event, "event observed");
                Ok(receipt)
            }
            Err(FollowerError::Timeout { .. }) => Err(FollowerError::EventTimeout {
                event: event.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Follow the happy path to completion: deploy (herc20 side only), fund,
    /// then redeem on the opposite ledger.
    pub async fn follow_to_completion(
        &self,
        swap_url: &Url,
    ) -> FollowerResult<Vec<TransactionReceipt>> {
        let swap = self.client.fetch_swap(swap_url).await?;
        let properties = &swap.properties;
        let script = action_script(
            properties.role,
            properties.alpha.kind(),
            properties.beta.kind(),
        );
        info!(role = ?properties.role, ?script, swap = %swap_url, "following swap to completion");

        let mut receipts = Vec::with_capacity(script.len());
        for action in script {
            receipts.push(self.assert_and_execute_next_action(swap_url, action).await?);
        }
        Ok(receipts)
    }
}

/// The protocol-prescribed action sequence for one party.
fn action_script(role: Role, alpha: ProtocolKind, beta: ProtocolKind) -> Vec<ActionName> {
    let own = match role {
        Role::Alice => alpha,
        Role::Bob => beta,
    };

    let mut script = Vec::new();
    if own == ProtocolKind::Herc20 {
        script.push(ActionName::Deploy);
    }
    script.push(ActionName::Fund);
    script.push(ActionName::Redeem);
    script
}
