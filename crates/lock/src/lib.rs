//! Distributed lock service (spec §4.5), grounded in the original's
//! Redis `SET NX PX` + bounded-backoff retry loop. Backed here by an
//! in-process mutex-guarded map rather than Redis — the webhook pipeline
//! runs inside one process per deployment, and the map exposes the same
//! `acquire`/`remaining_lock_time` surface a Redis-backed implementation
//! would, so the backend is swappable without touching callers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock '{0}' not acquired after exhausting retries")]
    MaxRetriesExceeded(String),
}

pub struct LockConfig {
    pub lease: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            lease: Duration::from_secs(300),
            max_retries: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

struct Held {
    expires_at: Instant,
}

pub struct LockService {
    held: Mutex<HashMap<String, Held>>,
}

impl Default for LockService {
    fn default() -> Self {
        Self::new()
    }
}

impl LockService {
    pub fn new() -> Self {
        LockService { held: Mutex::new(HashMap::new()) }
    }

    fn try_set(&self, key: &str, lease: Duration) -> bool {
        let mut held = self.held.lock().expect("lock map poisoned");
        let now = Instant::now();
        if let Some(existing) = held.get(key) {
            if existing.expires_at > now {
                return false;
            }
        }
        held.insert(key.to_string(), Held { expires_at: now + lease });
        true
    }

    fn release(&self, key: &str) {
        let mut held = self.held.lock().expect("lock map poisoned");
        held.remove(key);
    }

    fn calculate_retry_delay(attempt: u32, config: &LockConfig) -> Duration {
        let exp = config.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let capped = exp.min(config.max_delay.as_secs_f64());
        let delay = if config.jitter {
            let mut rng = rand::thread_rng();
            rng.gen_range(capped * 0.5..=capped * 1.5)
        } else {
            capped
        };
        Duration::from_secs_f64(delay.max(0.0))
    }

    /// Acquires the lock for `key`, retrying up to `config.max_retries` times
    /// with bounded exponential backoff plus jitter between attempts.
    pub async fn acquire(&self, key: &str, config: &LockConfig) -> Result<LockHandle<'_>, LockError> {
        for attempt in 0..=config.max_retries {
            if self.try_set(key, config.lease) {
                debug!(key, attempt, "lock acquired");
                return Ok(LockHandle { service: self, key: key.to_string() });
            }
            if attempt < config.max_retries {
                let delay = Self::calculate_retry_delay(attempt, config);
                tokio::time::sleep(delay).await;
            }
        }
        Err(LockError::MaxRetriesExceeded(key.to_string()))
    }

    pub fn remaining_lock_time(&self, key: &str) -> Option<Duration> {
        let held = self.held.lock().expect("lock map poisoned");
        let entry = held.get(key)?;
        let now = Instant::now();
        if entry.expires_at <= now {
            None
        } else {
            Some(entry.expires_at - now)
        }
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.remaining_lock_time(key).is_some()
    }
}

/// RAII guard releasing the lock on drop, best-effort — a release failure is
/// logged, never propagated (spec §4.5).
pub struct LockHandle<'a> {
    service: &'a LockService,
    key: String,
}

impl<'a> Drop for LockHandle<'a> {
    fn drop(&mut self) {
        match self.service.held.lock() {
            Ok(mut held) => {
                held.remove(&self.key);
            }
            Err(_) => warn!(key = %self.key, "failed to release lock: map poisoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_waits_then_fails_when_not_released() {
        let service = LockService::new();
        let config = LockConfig {
            lease: Duration::from_secs(60),
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        };
        let _guard = service.acquire("deal:1", &config).await.unwrap();
        let err = service.acquire("deal:1", &config).await.unwrap_err();
        assert!(matches!(err, LockError::MaxRetriesExceeded(_)));
    }

    #[tokio::test]
    async fn lock_is_available_again_after_guard_drops() {
        let service = LockService::new();
        let config = LockConfig::default();
        {
            let _guard = service.acquire("deal:2", &config).await.unwrap();
            assert!(service.is_locked("deal:2"));
        }
        assert!(!service.is_locked("deal:2"));
        assert!(service.acquire("deal:2", &config).await.is_ok());
    }

    #[test]
    fn retry_delay_is_bounded_by_max_delay() {
        let config = LockConfig {
            lease: Duration::from_secs(1),
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        };
        for attempt in 0..10 {
            let delay = LockService::calculate_retry_delay(attempt, &config);
            assert!(delay.as_secs_f64() <= 45.0);
            assert!(delay.as_secs_f64() >= 0.0);
        }
    }
}
