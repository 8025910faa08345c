//! Bounded polling primitive
//!
//! Every wait in the follower goes through `poll_until` so all callers get
//! identical timeout and cancellation behavior: the deadline is enforced with
//! `tokio::time::timeout`, so dropping the returned future stops the loop
//! before its next fetch.

use crate::error::{FollowerError, FollowerResult};

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Re-fetch a resource on a fixed interval until `predicate` holds.
///
/// Returns the first body for which the predicate holds; no further fetches
/// are performed afterwards. Recoverable fetch errors (daemon hiccup, action
/// not yet listed) are traced and retried on the next tick; any other error
/// aborts the loop immediately. Elapsing `deadline` fails with
/// [`FollowerError::Timeout`] naming `awaiting`.
pub async fn poll_until<T, F, Fut, P>(
    awaiting: &str,
    interval: Duration,
    deadline: Duration,
    mut fetch: F,
    predicate: P,
) -> FollowerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FollowerResult<T>>,
    P: Fn(&T) -> bool,
{
    let polling = async {
        loop {
            match fetch().await {
                Ok(body) if predicate(&body) => return Ok(body),
                Ok(_) => {
                    debug!(awaiting, "condition not yet met");
                }
                Err(e) if e.is_recoverable() => {
                    debug!(awaiting, error = %e, "transient failure, retrying on next tick");
                }
                Err(e) => return Err(e),
            }
            sleep(interval).await;
        }
    };

    match timeout(deadline, polling).await {
        Ok(result) => result,
        Err(_) => Err(FollowerError::Timeout {
            awaiting: awaiting.to_string(),
        }),
    }
}
