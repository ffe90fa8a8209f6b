//! Failed-login counter and lockout gate.
//!
//! [`LoginAttempts`] is the store interface; production deployments with
//! more than one replica back it with a shared store. The in-memory default
//! counts per lowercased email and locks the email out once the count
//! reaches the configured maximum, until a successful login or the lockout
//! period elapses. Failures older than the lockout period no longer count,
//! and stale entries are swept at most once per period.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

/// Lockout state returned by [`LoginAttempts::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Open,
    Locked { retry_after: Duration },
}

#[async_trait]
pub trait LoginAttempts: Send + Sync {
    async fn check(&self, email: &str) -> Gate;

    /// Record a failure and return the failure count so far.
    async fn record_failure(&self, email: &str) -> u32;

    async fn clear(&self, email: &str);
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    failures: u32,
    first_failure: Instant,
    locked_until: Option<Instant>,
}

impl Entry {
    fn is_stale(&self, now: Instant, lockout: Duration) -> bool {
        match self.locked_until {
            Some(until) => until <= now,
            None => now.duration_since(self.first_failure) >= lockout,
        }
    }
}

#[derive(Debug)]
pub struct InMemoryLoginAttempts {
    max_attempts: u32,
    lockout: Duration,
    entries: DashMap<String, Entry>,
    epoch: Instant,
    last_sweep_nanos: AtomicU64,
}

impl InMemoryLoginAttempts {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            lockout,
            entries: DashMap::new(),
            epoch: Instant::now(),
            last_sweep_nanos: AtomicU64::new(0),
        }
    }

    fn sweep_stale(&self, now: Instant) {
        let elapsed = u64::try_from(now.duration_since(self.epoch).as_nanos()).unwrap_or(u64::MAX);
        let period = u64::try_from(self.lockout.as_nanos()).unwrap_or(u64::MAX);
        let last = self.last_sweep_nanos.load(Ordering::Relaxed);
        if elapsed.saturating_sub(last) < period {
            return;
        }
        if self
            .last_sweep_nanos
            .compare_exchange(last, elapsed, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        self.entries.retain(|_, entry| !entry.is_stale(now, self.lockout));
    }
}

fn key(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait]
impl LoginAttempts for InMemoryLoginAttempts {
    async fn check(&self, email: &str) -> Gate {
        let key = key(email);
        let now = Instant::now();
        let expired = match self.entries.get(&key).and_then(|e| e.locked_until) {
            Some(until) if until > now => return Gate::Locked { retry_after: until - now },
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(&key);
        }
        Gate::Open
    }

    async fn record_failure(&self, email: &str) -> u32 {
        let now = Instant::now();
        self.sweep_stale(now);
        let mut entry = self.entries.entry(key(email)).or_insert(Entry {
            failures: 0,
            first_failure: now,
            locked_until: None,
        });
        if entry.is_stale(now, self.lockout) {
            *entry = Entry {
                failures: 0,
                first_failure: now,
                locked_until: None,
            };
        }
        entry.failures += 1;
        if entry.failures >= self.max_attempts {
            entry.locked_until = Some(now + self.lockout);
        }
        entry.failures
    }

    async fn clear(&self, email: &str) {
        self.entries.remove(&key(email));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn locks_after_max_failures() {
        let guard = InMemoryLoginAttempts::new(3, Duration::from_secs(900));
        for expected in 1..=2 {
            assert_eq!(guard.record_failure("Ada@Example.com").await, expected);
            assert_eq!(guard.check("ada@example.com").await, Gate::Open);
        }
        assert_eq!(guard.record_failure("ada@example.com").await, 3);
        assert!(matches!(guard.check("ADA@example.com").await, Gate::Locked { .. }));
    }

    #[tokio::test]
    async fn success_clears_counter() {
        let guard = InMemoryLoginAttempts::new(2, Duration::from_secs(900));
        guard.record_failure("a@b.co").await;
        guard.clear("a@b.co").await;
        assert_eq!(guard.record_failure("a@b.co").await, 1);
        assert_eq!(guard.check("a@b.co").await, Gate::Open);
    }

    #[tokio::test]
    async fn lockout_expires() {
        let guard = InMemoryLoginAttempts::new(1, Duration::ZERO);
        guard.record_failure("a@b.co").await;
        assert_eq!(guard.check("a@b.co").await, Gate::Open);
        assert_eq!(guard.record_failure("a@b.co").await, 1);
    }

    #[tokio::test]
    async fn old_failures_stop_counting() {
        let guard = InMemoryLoginAttempts::new(2, Duration::from_millis(30));
        assert_eq!(guard.record_failure("a@b.co").await, 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(guard.record_failure("a@b.co").await, 1);
        assert_eq!(guard.check("a@b.co").await, Gate::Open);
    }

    #[tokio::test]
    async fn stale_entries_are_swept() {
        let guard = InMemoryLoginAttempts::new(5, Duration::from_millis(10));
        for i in 0..1_000 {
            guard.record_failure(&format!("user{i}@example.com")).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        guard.record_failure("late@example.com").await;
        assert_eq!(guard.entries.len(), 1);
    }

    #[tokio::test]
    async fn emails_are_independent() {
        let guard = InMemoryLoginAttempts::new(1, Duration::from_secs(900));
        guard.record_failure("a@b.co").await;
        assert_eq!(guard.check("c@d.co").await, Gate::Open);
    }
}
