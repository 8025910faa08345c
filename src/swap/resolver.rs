//! Event-expectation resolver
//!
//! Maps (role, action, alpha protocol, beta protocol) to the single event
//! that must appear in the swap's event sequence once the action's chain
//! effect has been observed by the daemon. The swap topology is fixed: Alice
//! acts on alpha for fund and refund, Bob on beta, and redeem sides are
//! inverted. Only herc20 has a deploy step.

use super::{ActionName, EventKind, ProtocolKind, Role};

/// The event expected after executing `action`, or `None` if the action's
/// effect is not independently observable as a named event.
pub fn expected_event(
    role: Role,
    action: ActionName,
    alpha: ProtocolKind,
    beta: ProtocolKind,
) -> Option<EventKind> {
    match action {
        // Deploy is independent of role: only herc20 deploys, and there is
        // at most one herc20 side. Without a herc20 side no deploy event
        // exists and the action is confirmed by its own receipt.
        ActionName::Deploy => {
            if alpha == ProtocolKind::Herc20 || beta == ProtocolKind::Herc20 {
                Some(EventKind::Herc20Deployed)
            } else {
                None
            }
        }
        ActionName::Fund => Some(funded(own_ledger(role, alpha, beta))),
        ActionName::Refund => Some(refunded(own_ledger(role, alpha, beta))),
        ActionName::Redeem => Some(redeemed(counter_ledger(role, alpha, beta))),
    }
}

/// The ledger a party funds and refunds on.
fn own_ledger(role: Role, alpha: ProtocolKind, beta: ProtocolKind) -> ProtocolKind {
    match role {
        Role::Alice => alpha,
        Role::Bob => beta,
    }
}

/// The ledger a party redeems on.
fn counter_ledger(role: Role, alpha: ProtocolKind, beta: ProtocolKind) -> ProtocolKind {
    match role {
        Role::Alice => beta,
        Role::Bob => alpha,
    }
}

fn funded(protocol: ProtocolKind) -> EventKind {
    match protocol {
        ProtocolKind::Hbit => EventKind::HbitFunded,
        ProtocolKind::Herc20 => EventKind::Herc20Funded,
    }
}

fn redeemed(protocol: ProtocolKind) -> EventKind {
    match protocol {
        ProtocolKind::Hbit => EventKind::HbitRedeemed,
        ProtocolKind::Herc20 => EventKind::Herc20Redeemed,
    }
}

fn refunded(protocol: ProtocolKind) -> EventKind {
    match protocol {
        ProtocolKind::Hbit => EventKind::HbitRefunded,
        ProtocolKind::Herc20 => EventKind::Herc20Refunded,
    }
}
