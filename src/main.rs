//! swap-follower - drives one party's side of a cross-chain atomic swap
//!
//! Connects to the settlement daemon, waits for the counterparty and an
//! active swap, then follows the daemon-advertised actions to completion.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use swap_follower::client::SwapClient;
use swap_follower::config::Settings;
use swap_follower::ledger::Wallets;
use swap_follower::Follower;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting swap follower v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    let daemon_url = settings.daemon.url.parse()?;

    let wallets = Arc::new(Wallets::from_settings(&settings)?);
    let client = SwapClient::new(daemon_url);
    let follower = Follower::new(client, wallets, settings.follower.tuning());

    if let Some(peer) = &settings.daemon.expected_peer {
        info!(peer = %peer, "waiting for daemon to see its counterparty");
        follower.wait_for_peer(peer).await?;
    }

    let swap_url = follower.wait_for_swap().await?;
    info!(swap = %swap_url, "found active swap");

    let receipts = follower.follow_to_completion(&swap_url).await?;
    for receipt in &receipts {
        info!(tx = %receipt.tx_id, "confirmed transaction");
    }

    follower.assert_no_active_swaps().await?;
    info!("swap complete, no swaps remain active");

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swap_follower=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
