//! Follower behavior against a mocked settlement daemon.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use swap_follower::client::SwapClient;
use swap_follower::error::{FollowerError, FollowerResult};
use swap_follower::follower::{Follower, FollowerTuning};
use swap_follower::ledger::{ExecuteLedgerAction, LedgerActionPayload, TransactionReceipt};
use swap_follower::swap::{ActionName, EventKind};

/// Wallet double: records executions, confirms instantly.
struct FakeWallets {
    executions: AtomicUsize,
}

impl FakeWallets {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            executions: AtomicUsize::new(0),
        })
    }

    fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecuteLedgerAction for FakeWallets {
    async fn execute(&self, payload: &LedgerActionPayload) -> FollowerResult<TransactionReceipt> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(TransactionReceipt {
            tx_id: format!("0xfake-{}", payload.kind()),
        })
    }
}

fn fast_tuning() -> FollowerTuning {
    FollowerTuning {
        poll_interval: Duration::from_millis(10),
        action_timeout: Duration::from_millis(500),
        event_timeout: Duration::from_millis(500),
    }
}

fn swap_json(
    role: &str,
    alpha: &str,
    beta: &str,
    actions: &[&str],
    events: &[(&str, &str)],
) -> Value {
    json!({
        "properties": {
            "role": role,
            "alpha": {
                "protocol": alpha,
                "asset": { "currency": "BTC", "value": "10000", "decimals": 8 }
            },
            "beta": {
                "protocol": beta,
                "asset": { "currency": "DAI", "value": "9000", "decimals": 18 }
            },
            "events": events
                .iter()
                .map(|(name, tx)| json!({ "name": name, "tx": tx }))
                .collect::<Vec<_>>()
        },
        "actions": actions
            .iter()
            .map(|name| json!({ "name": name, "href": format!("/swaps/7/{}", name), "method": "GET" }))
            .collect::<Vec<_>>(),
        "links": [ { "rel": ["self"], "href": "/swaps/7" } ]
    })
}

fn follower_for(server: &MockServer, wallets: Arc<FakeWallets>) -> Follower {
    let client = SwapClient::new(server.uri().parse().unwrap());
    Follower::new(client, wallets, fast_tuning())
}

fn swap_url(server: &MockServer) -> reqwest::Url {
    format!("{}/swaps/7", server.uri()).parse().unwrap()
}

#[tokio::test]
async fn executes_the_action_once_it_appears_and_sees_the_event() {
    let server = MockServer::start().await;

    // First poll tick: no actions yet.
    Mock::given(method("GET"))
        .and(path("/swaps/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(swap_json(
            "Alice",
            "herc20",
            "hbit",
            &[],
            &[],
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // Afterwards the fund action is listed and its event already observed.
    Mock::given(method("GET"))
        .and(path("/swaps/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(swap_json(
            "Alice",
            "herc20",
            "hbit",
            &["fund"],
            &[("herc20_funded", "0xabc")],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/swaps/7/fund"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "ethereum-call-contract",
            "payload": {
                "contract_address": "0x0000000000000000000000000000000000000001",
                "data": "0xdeadbeef",
                "gas_limit": "0x2dc6c0",
                "chain_id": 1337
            }
        })))
        .mount(&server)
        .await;

    let wallets = FakeWallets::new();
    let follower = follower_for(&server, wallets.clone());

    let receipt = follower
        .assert_and_execute_next_action(&swap_url(&server), ActionName::Fund)
        .await
        .unwrap();

    assert_eq!(receipt.tx_id, "0xfake-ethereum-call-contract");
    assert_eq!(wallets.executions(), 1);
}

#[tokio::test]
async fn missing_event_fails_with_event_timeout_and_no_further_action() {
    let server = MockServer::start().await;

    // Action available, but the daemon never observes the chain effect.
    Mock::given(method("GET"))
        .and(path("/swaps/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(swap_json(
            "Alice",
            "hbit",
            "herc20",
            &["fund"],
            &[],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/swaps/7/fund"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "bitcoin-send-amount-to-address",
            "payload": {
                "to": "bcrt1qs7yxtl0y2t7a8hxvkzd2fhgt4y2mq9cz6kn0fu",
                "amount": "10000",
                "network": "regtest"
            }
        })))
        .mount(&server)
        .await;

    let wallets = FakeWallets::new();
    let follower = follower_for(&server, wallets.clone());

    let result = follower
        .assert_and_execute_next_action(&swap_url(&server), ActionName::Fund)
        .await;

    match result {
        Err(FollowerError::EventTimeout { event }) => assert_eq!(event, "hbit_funded"),
        other => panic!("expected event timeout, got {:?}", other.map(|_| ())),
    }
    assert_eq!(wallets.executions(), 1);
}

#[tokio::test]
async fn fetched_swap_exposes_properties_actions_and_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/swaps/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(swap_json(
            "Bob",
            "hbit",
            "herc20",
            &["redeem"],
            &[("hbit_funded", "c3a1"), ("herc20_funded", "0xabc")],
        )))
        .mount(&server)
        .await;

    let client = SwapClient::new(server.uri().parse().unwrap());
    let swap = client.fetch_swap(&swap_url(&server)).await.unwrap();

    assert!(swap.has_event(EventKind::HbitFunded));
    assert!(!swap.has_event(EventKind::HbitRedeemed));
    assert!(swap.find_action(ActionName::Redeem).is_ok());

    let missing = swap.find_action(ActionName::Fund).unwrap_err();
    assert!(missing.is_recoverable());
}

#[tokio::test]
async fn daemon_errors_map_to_resource_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/swaps/7"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = SwapClient::new(server.uri().parse().unwrap());
    let err = client.fetch_swap(&swap_url(&server)).await.unwrap_err();

    assert!(matches!(err, FollowerError::ResourceUnavailable { .. }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn waits_until_the_expected_peer_is_listed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/peers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "peers": [] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/peers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "peers": [ { "id": "QmCounterparty", "endpoints": ["/ip4/127.0.0.1/tcp/9939"] } ]
        })))
        .mount(&server)
        .await;

    let follower = follower_for(&server, FakeWallets::new());

    follower.wait_for_peer("QmCounterparty").await.unwrap();

    let absent = follower.wait_for_peer("QmStranger").await;
    assert!(matches!(absent, Err(FollowerError::Timeout { .. })));
}

#[tokio::test]
async fn discovers_the_active_swap_and_asserts_none_remain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/swaps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entities": [ { "rel": ["item"], "href": "/swaps/7" } ]
        })))
        .mount(&server)
        .await;

    let follower = follower_for(&server, FakeWallets::new());

    let url = follower.wait_for_swap().await.unwrap();
    assert!(url.as_str().ends_with("/swaps/7"));

    let remaining = follower.assert_no_active_swaps().await;
    assert!(matches!(
        remaining,
        Err(FollowerError::ActiveSwapsRemain { count: 1 })
    ));
}

#[tokio::test]
async fn fully_traded_orders_pass_the_closed_assertion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/closed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {
                "quantity": { "currency": "BTC", "value": "10000000", "decimals": 8 },
                "state": {
                    "open": "0", "closed": "10000000",
                    "settling": "0", "failed": "0", "cancelled": "0"
                }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/settling"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {
                "quantity": { "currency": "BTC", "value": "10000000", "decimals": 8 },
                "state": {
                    "open": "0", "closed": "9000000",
                    "settling": "1000000", "failed": "0", "cancelled": "0"
                }
            }
        })))
        .mount(&server)
        .await;

    let follower = follower_for(&server, FakeWallets::new());

    follower
        .assert_order_closed(&format!("{}/orders/closed", server.uri()).parse().unwrap())
        .await
        .unwrap();

    let not_closed = follower
        .assert_order_closed(&format!("{}/orders/settling", server.uri()).parse().unwrap())
        .await;
    assert!(matches!(not_closed, Err(FollowerError::OrderState(_))));
}

#[tokio::test]
async fn follows_a_whole_swap_to_completion() {
    let server = MockServer::start().await;

    // Alice on an hbit alpha: fund on alpha, redeem on the herc20 beta. The
    // daemon already reflects both events, so each phase completes on its
    // first tick.
    Mock::given(method("GET"))
        .and(path("/swaps/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(swap_json(
            "Alice",
            "hbit",
            "herc20",
            &["fund", "redeem"],
            &[("hbit_funded", "c3a1"), ("herc20_redeemed", "0xabc")],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/swaps/7/fund"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "bitcoin-send-amount-to-address",
            "payload": { "to": "bcrt1qs7", "amount": "10000", "network": "regtest" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/swaps/7/redeem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "ethereum-call-contract",
            "payload": {
                "contract_address": "0x0000000000000000000000000000000000000001",
                "gas_limit": "0x2dc6c0",
                "chain_id": 1337
            }
        })))
        .mount(&server)
        .await;

    let wallets = FakeWallets::new();
    let follower = follower_for(&server, wallets.clone());

    let receipts = follower
        .follow_to_completion(&swap_url(&server))
        .await
        .unwrap();

    assert_eq!(
        receipts
            .iter()
            .map(|receipt| receipt.tx_id.as_str())
            .collect::<Vec<_>>(),
        vec![
            "0xfake-bitcoin-send-amount-to-address",
            "0xfake-ethereum-call-contract"
        ]
    );
    assert_eq!(wallets.executions(), 2);
}
