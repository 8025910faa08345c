//! Cross-process account lock
//!
//! Multiple follower processes may share one funding account in a dev or test
//! environment, so the ordering-token source is guarded by an advisory lock
//! file scoped to the account. Acquisition retries with capped exponential
//! backoff plus jitter; the guard removes the lock file on drop so the lock is
//! released on every exit path.

use crate::error::{FollowerError, FollowerResult};

use rand::Rng;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const DEFAULT_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(2);
const JITTER_MS: u64 = 50;

/// Scoped exclusive acquisition of an account's ordering-token source.
pub struct AccountLock {
    path: PathBuf,
    max_attempts: u32,
    base_delay: Duration,
}

impl AccountLock {
    pub fn new(dir: &Path, account: &str) -> Self {
        Self {
            path: dir.join(format!("{}.lock", account)),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    pub fn with_retries(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.base_delay = base_delay;
        self
    }

    /// Acquire the lock, retrying with backoff while another holder exists.
    ///
    /// Fails with `LockTimeout` once the attempt budget is exhausted.
    pub async fn acquire(&self) -> FollowerResult<LockGuard> {
        for attempt in 0..self.max_attempts {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    debug!(path = %self.path.display(), attempt, "account lock acquired");
                    return Ok(LockGuard {
                        path: self.path.clone(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let delay = self.backoff(attempt);
                    debug!(
                        path = %self.path.display(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "account lock held elsewhere, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(FollowerError::Ledger(format!(
                        "cannot create lock file {}: {}",
                        self.path.display(),
                        e
                    )))
                }
            }
        }

        Err(FollowerError::LockTimeout {
            path: self.path.display().to_string(),
            attempts: self.max_attempts,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(MAX_BACKOFF);
        exp + Duration::from_millis(rand::thread_rng().gen_range(0..=JITTER_MS))
    }
}

/// Holds the lock; dropping it releases the lock file.
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_lock(dir: &Path) -> AccountLock {
        AccountLock::new(dir, "0xfunding").with_retries(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn second_acquisition_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock = quick_lock(dir.path());

        let _guard = lock.acquire().await.unwrap();
        let contender = quick_lock(dir.path());

        match contender.acquire().await {
            Err(FollowerError::LockTimeout { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected lock timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn dropping_the_guard_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let lock = quick_lock(dir.path());

        let guard = lock.acquire().await.unwrap();
        drop(guard);

        assert!(quick_lock(dir.path()).acquire().await.is_ok());
    }

    #[tokio::test]
    async fn waiting_contender_wins_once_the_holder_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock = AccountLock::new(dir.path(), "0xfunding")
            .with_retries(20, Duration::from_millis(5));

        let guard = lock.acquire().await.unwrap();
        let contender = AccountLock::new(dir.path(), "0xfunding")
            .with_retries(20, Duration::from_millis(5));
        let waiting = tokio::spawn(async move { contender.acquire().await.map(|_| ()) });

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(guard);

        waiting.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn locks_for_different_accounts_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let a = AccountLock::new(dir.path(), "0xalpha");
        let b = AccountLock::new(dir.path(), "0xbeta");

        let _guard_a = a.acquire().await.unwrap();
        assert!(b.acquire().await.is_ok());
    }
}
