//! Hypermedia client for the settlement daemon
//!
//! The daemon's REST interface is the only way this crate observes or
//! advances a swap: swap resources, the peers endpoint, orders and the active
//! swap collection are all fetched here. Transport failures and 5xx answers
//! map to `ResourceUnavailable`, which enclosing poll loops treat as
//! transient.

pub mod siren;

use crate::error::{FollowerError, FollowerResult};
use crate::ledger::LedgerActionPayload;
use crate::swap::{Order, Swap, SwapProperties};

use reqwest::{Method, Url};
use serde::Deserialize;
use tracing::debug;

/// A peer known to the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Peer {
    pub id: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PeersDocument {
    peers: Vec<Peer>,
}

/// Client for one settlement daemon instance.
pub struct SwapClient {
    http: reqwest::Client,
    daemon_url: Url,
}

impl SwapClient {
    pub fn new(daemon_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            daemon_url,
        }
    }

    /// Resolve a daemon-relative href against the daemon root.
    pub fn url_for(&self, href: &str) -> FollowerResult<Url> {
        self.daemon_url
            .join(href)
            .map_err(|e| FollowerError::Config(format!("invalid href '{}': {}", href, e)))
    }

    /// Fetch the current representation of a swap resource.
    pub async fn fetch_swap(&self, url: &Url) -> FollowerResult<Swap> {
        let document = self.fetch_document(url).await?;

        let properties: SwapProperties =
            document
                .typed_properties()
                .map_err(|e| FollowerError::MalformedDocument {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        Ok(Swap {
            location: url.to_string(),
            properties,
            actions: document.actions,
        })
    }

    /// Execute the HTTP request an action describes, yielding the ledger
    /// transaction the party must perform.
    pub async fn resolve_action(
        &self,
        action: &siren::Action,
    ) -> FollowerResult<LedgerActionPayload> {
        let url = self.url_for(&action.href)?;
        let method: Method = action
            .method
            .parse()
            .map_err(|_| FollowerError::MalformedDocument {
                url: url.to_string(),
                message: format!("unsupported method '{}'", action.method),
            })?;

        debug!(action = %action.name, %url, "resolving action against daemon");

        let response = self
            .http
            .request(method, url.clone())
            .send()
            .await
            .map_err(|e| unavailable(&url, e))?;
        let response = reject_server_errors(url.clone(), response)?;

        response
            .json()
            .await
            .map_err(|e| FollowerError::MalformedDocument {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// Peers currently known to the daemon.
    pub async fn peers(&self) -> FollowerResult<Vec<Peer>> {
        let url = self.url_for("/peers")?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| unavailable(&url, e))?;
        let response = reject_server_errors(url.clone(), response)?;

        let document: PeersDocument =
            response
                .json()
                .await
                .map_err(|e| FollowerError::MalformedDocument {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
        Ok(document.peers)
    }

    /// Locators of all currently active swaps.
    pub async fn active_swaps(&self) -> FollowerResult<Vec<Url>> {
        let url = self.url_for("/swaps")?;
        let document = self.fetch_document(&url).await?;

        document
            .entities
            .iter()
            .filter_map(|entity| entity.href.as_deref())
            .map(|href| self.url_for(href))
            .collect()
    }

    /// Fetch an order document.
    pub async fn fetch_order(&self, url: &Url) -> FollowerResult<Order> {
        let document = self.fetch_document(url).await?;

        document
            .typed_properties()
            .map_err(|e| FollowerError::MalformedDocument {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn fetch_document(&self, url: &Url) -> FollowerResult<siren::Document> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| unavailable(url, e))?;
        let response = reject_server_errors(url.clone(), response)?;

        response
            .json()
            .await
            .map_err(|e| FollowerError::MalformedDocument {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

fn unavailable(url: &Url, error: reqwest::Error) -> FollowerError {
    FollowerError::ResourceUnavailable {
        url: url.to_string(),
        message: error.to_string(),
    }
}

fn reject_server_errors(url: Url, response: reqwest::Response) -> FollowerResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FollowerError::ResourceUnavailable {
            url: url.to_string(),
            message: format!("daemon answered {}", status),
        })
    }
}
