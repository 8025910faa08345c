//! Swap domain model
//!
//! Mirrors the documents the settlement daemon serves: a swap resource with a
//! role, two lock protocols, an append-only event sequence and the currently
//! executable actions, plus the order documents used by the trade assertions.

pub mod resolver;

use crate::client::siren;
use crate::error::{FollowerError, FollowerResult};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two fixed swap roles.
///
/// Alice always initiates on the alpha ledger, Bob on beta; redeem sides are
/// inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Alice,
    Bob,
}

/// The two supported on-chain locking mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    /// Bitcoin HTLC: fund, redeem, refund. No deploy step.
    Hbit,
    /// Ethereum ERC20 HTLC: deploy, fund, redeem, refund.
    Herc20,
}

/// An asset description as served by the daemon, value as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub currency: String,
    pub value: String,
    pub decimals: u8,
}

/// A lock protocol together with the asset it locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "protocol")]
pub enum LockProtocol {
    Hbit { asset: Amount },
    Herc20 { asset: Amount },
}

impl LockProtocol {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            LockProtocol::Hbit { .. } => ProtocolKind::Hbit,
            LockProtocol::Herc20 { .. } => ProtocolKind::Herc20,
        }
    }
}

/// The daemon-advertised action names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    Deploy,
    Fund,
    Redeem,
    Refund,
}

impl ActionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Deploy => "deploy",
            ActionName::Fund => "fund",
            ActionName::Redeem => "redeem",
            ActionName::Refund => "refund",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed vocabulary of swap events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    HbitFunded,
    HbitRedeemed,
    HbitRefunded,
    Herc20Deployed,
    Herc20Funded,
    Herc20Redeemed,
    Herc20Refunded,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::HbitFunded => "hbit_funded",
            EventKind::HbitRedeemed => "hbit_redeemed",
            EventKind::HbitRefunded => "hbit_refunded",
            EventKind::Herc20Deployed => "herc20_deployed",
            EventKind::Herc20Funded => "herc20_funded",
            EventKind::Herc20Redeemed => "herc20_redeemed",
            EventKind::Herc20Refunded => "herc20_refunded",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the swap's append-only event sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
    pub name: EventKind,
    /// Opaque reference to the chain transaction the daemon observed.
    pub tx: String,
}

/// The `properties` object of a swap document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapProperties {
    pub role: Role,
    pub alpha: LockProtocol,
    pub beta: LockProtocol,
    #[serde(default)]
    pub events: Vec<SwapEvent>,
}

/// A fetched swap representation: properties plus currently listed actions.
#[derive(Debug, Clone)]
pub struct Swap {
    /// The resource locator this representation was fetched from.
    pub location: String,
    pub properties: SwapProperties,
    pub actions: Vec<siren::Action>,
}

impl Swap {
    /// The action matching `name` among the currently listed actions.
    ///
    /// `ActionNotFound` is an expected, recoverable condition: the daemon may
    /// simply not have advertised the action yet.
    pub fn find_action(&self, name: ActionName) -> FollowerResult<&siren::Action> {
        self.actions
            .iter()
            .find(|action| action.name == name.as_str())
            .ok_or_else(|| FollowerError::ActionNotFound {
                action: name.to_string(),
            })
    }

    pub fn has_event(&self, kind: EventKind) -> bool {
        self.properties.events.iter().any(|event| event.name == kind)
    }
}

/// Per-state quantities of an order, decimal strings in the quantity's unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    pub open: String,
    pub closed: String,
    pub settling: String,
    pub failed: String,
    pub cancelled: String,
}

/// The `properties` object of an order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub quantity: Amount,
    pub state: OrderState,
}

impl Order {
    /// A fully traded order: everything closed, all other counters zero.
    pub fn is_fully_closed(&self) -> bool {
        self.state.closed == self.quantity.value
            && self.state.open == "0"
            && self.state.settling == "0"
            && self.state.failed == "0"
            && self.state.cancelled == "0"
    }
}
