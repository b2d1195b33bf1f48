// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Three-tier login admission control.
//!
//! Every login attempt is checked against three independent token buckets:
//!
//! | Tier | Key | Default quota |
//! |------|-----|---------------|
//! | Global | none | configured rate/burst |
//! | Address | client address | 20 per hour, burst 20 |
//! | Account | normalized username | 5 per 10 minutes, burst 5 |
//!
//! All three checks run for every attempt (each debits its bucket when it has
//! a token), and the first exhausted tier in the order global, address,
//! account decides the rejection. Decisions never block or queue.
//!
//! Buckets are GCRA cells from `governor`, keyed through its sharded
//! concurrent map, so concurrent attempts for the same key serialize on a
//! single atomic cell update.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, DefaultKeyedRateLimiter, Quota, RateLimiter};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Per-account attempts allowed per window.
pub const ACCOUNT_CAPACITY: u32 = 5;
/// Per-account refill window (10 minutes).
pub const ACCOUNT_WINDOW: Duration = Duration::from_secs(10 * 60);
/// Per-address attempts allowed per window.
pub const ADDRESS_CAPACITY: u32 = 20;
/// Per-address refill window (1 hour).
pub const ADDRESS_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Default interval between bucket pruning sweeps.
const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Limiter tier that rejected an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitTier {
    /// Service-wide overload.
    Global,
    /// Too many attempts from one client address.
    Address,
    /// Too many attempts against one account.
    Account,
}

impl RateLimitTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitTier::Global => "global",
            RateLimitTier::Address => "address",
            RateLimitTier::Account => "account",
        }
    }
}

/// Outcome of [`LoginRateLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted,
    Rejected(RateLimitTier),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitConfigError {
    #[error("{0} quota capacity must be at least 1")]
    ZeroCapacity(&'static str),
    #[error("{0} quota refill period must be positive and finite")]
    InvalidPeriod(&'static str),
}

/// Token bucket quota for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierQuota(Quota);

impl TierQuota {
    /// `capacity` tokens, refilled continuously over `window`.
    pub fn per_window(
        tier: &'static str,
        capacity: u32,
        window: Duration,
    ) -> Result<Self, RateLimitConfigError> {
        let burst = NonZeroU32::new(capacity).ok_or(RateLimitConfigError::ZeroCapacity(tier))?;
        let period = window / capacity;
        let quota = Quota::with_period(period).ok_or(RateLimitConfigError::InvalidPeriod(tier))?;
        Ok(Self(quota.allow_burst(burst)))
    }

    /// `rate` tokens per second with a bucket of `burst` tokens.
    pub fn per_second(
        tier: &'static str,
        rate: f64,
        burst: u32,
    ) -> Result<Self, RateLimitConfigError> {
        let burst = NonZeroU32::new(burst).ok_or(RateLimitConfigError::ZeroCapacity(tier))?;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(RateLimitConfigError::InvalidPeriod(tier));
        }
        let period = Duration::try_from_secs_f64(1.0 / rate)
            .map_err(|_| RateLimitConfigError::InvalidPeriod(tier))?;
        let quota = Quota::with_period(period).ok_or(RateLimitConfigError::InvalidPeriod(tier))?;
        Ok(Self(quota.allow_burst(burst)))
    }

    pub fn burst(&self) -> u32 {
        self.0.burst_size().get()
    }
}

/// Quotas for all three tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierQuotas {
    pub global: TierQuota,
    pub address: TierQuota,
    pub account: TierQuota,
}

impl TierQuotas {
    /// Default address and account quotas with a configured global quota.
    pub fn with_global(rate: f64, burst: u32) -> Result<Self, RateLimitConfigError> {
        Ok(Self {
            global: TierQuota::per_second("global", rate, burst)?,
            address: TierQuota::per_window("address", ADDRESS_CAPACITY, ADDRESS_WINDOW)?,
            account: TierQuota::per_window("account", ACCOUNT_CAPACITY, ACCOUNT_WINDOW)?,
        })
    }
}

/// Login admission controller.
pub struct LoginRateLimiter {
    global: DefaultDirectRateLimiter,
    addresses: DefaultKeyedRateLimiter<String>,
    accounts: DefaultKeyedRateLimiter<String>,
}

impl LoginRateLimiter {
    pub fn new(quotas: TierQuotas) -> Self {
        Self {
            global: RateLimiter::direct(quotas.global.0),
            addresses: RateLimiter::keyed(quotas.address.0),
            accounts: RateLimiter::keyed(quotas.account.0),
        }
    }

    /// Decide whether a login attempt for `account` from `address` may proceed.
    ///
    /// Each tier with a token left is debited, whether or not another tier
    /// rejects the attempt.
    pub fn admit(&self, account: &str, address: &str) -> Decision {
        let account = normalize_account(account);
        let address = address.to_string();

        let global_ok = self.global.check().is_ok();
        let address_ok = self.addresses.check_key(&address).is_ok();
        let account_ok = self.accounts.check_key(&account).is_ok();

        let decision = if !global_ok {
            Decision::Rejected(RateLimitTier::Global)
        } else if !address_ok {
            Decision::Rejected(RateLimitTier::Address)
        } else if !account_ok {
            Decision::Rejected(RateLimitTier::Account)
        } else {
            Decision::Admitted
        };

        debug!(account = %account, address = %address, decision = ?decision, "Login admission");
        decision
    }

    /// Number of tracked (address, account) buckets.
    pub fn tracked_keys(&self) -> (usize, usize) {
        (self.addresses.len(), self.accounts.len())
    }

    /// Drop buckets that have refilled completely.
    ///
    /// A full bucket behaves exactly like a freshly created one, so pruning
    /// never changes an admission decision.
    pub fn prune(&self) {
        self.addresses.retain_recent();
        self.addresses.shrink_to_fit();
        self.accounts.retain_recent();
        self.accounts.shrink_to_fit();
    }
}

/// Usernames differing only in case or surrounding whitespace share a bucket.
fn normalize_account(account: &str) -> String {
    account.trim().to_lowercase()
}

/// Background task that periodically prunes idle limiter buckets.
pub struct LimiterPruner {
    limiter: Arc<LoginRateLimiter>,
    interval: Duration,
}

impl LimiterPruner {
    pub fn new(limiter: Arc<LoginRateLimiter>) -> Self {
        Self {
            limiter,
            interval: DEFAULT_PRUNE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the pruning loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(LimiterPruner::new(limiter).run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Rate limiter pruner starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Rate limiter pruner shutting down");
                    return;
                }
            }

            self.limiter.prune();
            let (addresses, accounts) = self.limiter.tracked_keys();
            debug!(addresses, accounts, "Pruned rate limiter buckets");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter_with_global(rate: f64, burst: u32) -> LoginRateLimiter {
        LoginRateLimiter::new(TierQuotas::with_global(rate, burst).unwrap())
    }

    fn roomy() -> LoginRateLimiter {
        limiter_with_global(1000.0, 1000)
    }

    #[test]
    fn account_burst_then_rejection() {
        let limiter = roomy();
        for _ in 0..ACCOUNT_CAPACITY {
            assert_eq!(limiter.admit("alice", "10.0.0.1"), Decision::Admitted);
        }
        assert_eq!(
            limiter.admit("alice", "10.0.0.1"),
            Decision::Rejected(RateLimitTier::Account)
        );
        // Other accounts are unaffected.
        assert_eq!(limiter.admit("bob", "10.0.0.1"), Decision::Admitted);
    }

    #[test]
    fn account_key_ignores_case_and_whitespace() {
        let limiter = roomy();
        for name in ["alice", "Alice", " ALICE ", "aLiCe", "alice "] {
            assert_eq!(limiter.admit(name, "10.0.0.1"), Decision::Admitted);
        }
        assert_eq!(
            limiter.admit("ALICE", "10.0.0.1"),
            Decision::Rejected(RateLimitTier::Account)
        );
    }

    #[test]
    fn address_burst_then_rejection() {
        let limiter = roomy();
        for i in 0..ADDRESS_CAPACITY {
            assert_eq!(
                limiter.admit(&format!("user{i}"), "10.0.0.2"),
                Decision::Admitted
            );
        }
        assert_eq!(
            limiter.admit("fresh-user", "10.0.0.2"),
            Decision::Rejected(RateLimitTier::Address)
        );
        assert_eq!(limiter.admit("fresh-user", "10.0.0.3"), Decision::Admitted);
    }

    #[test]
    fn global_tier_takes_priority() {
        let limiter = limiter_with_global(0.001, 2);
        assert_eq!(limiter.admit("a", "10.0.0.1"), Decision::Admitted);
        assert_eq!(limiter.admit("b", "10.0.0.2"), Decision::Admitted);
        assert_eq!(
            limiter.admit("c", "10.0.0.3"),
            Decision::Rejected(RateLimitTier::Global)
        );
    }

    #[test]
    fn address_reported_before_account() {
        let quotas = TierQuotas {
            global: TierQuota::per_second("global", 1000.0, 1000).unwrap(),
            address: TierQuota::per_window("address", 1, Duration::from_secs(3600)).unwrap(),
            account: TierQuota::per_window("account", 1, Duration::from_secs(3600)).unwrap(),
        };
        let limiter = LoginRateLimiter::new(quotas);
        assert_eq!(limiter.admit("alice", "10.0.0.1"), Decision::Admitted);
        assert_eq!(
            limiter.admit("alice", "10.0.0.1"),
            Decision::Rejected(RateLimitTier::Address)
        );
    }

    #[test]
    fn rejected_attempts_still_debit_other_tiers() {
        let quotas = TierQuotas {
            global: TierQuota::per_second("global", 1000.0, 1000).unwrap(),
            address: TierQuota::per_window("address", 1, Duration::from_secs(3600)).unwrap(),
            account: TierQuota::per_window("account", 3, Duration::from_secs(3600)).unwrap(),
        };
        let limiter = LoginRateLimiter::new(quotas);

        assert_eq!(limiter.admit("alice", "10.0.0.1"), Decision::Admitted);
        // Address tier rejects these, but the account bucket is still debited.
        for _ in 0..2 {
            assert_eq!(
                limiter.admit("alice", "10.0.0.1"),
                Decision::Rejected(RateLimitTier::Address)
            );
        }
        assert_eq!(
            limiter.admit("alice", "10.0.0.9"),
            Decision::Rejected(RateLimitTier::Account)
        );
    }

    #[test]
    fn buckets_refill_over_time() {
        let quotas = TierQuotas {
            global: TierQuota::per_second("global", 1000.0, 1000).unwrap(),
            address: TierQuota::per_window("address", 100, Duration::from_secs(3600)).unwrap(),
            account: TierQuota::per_window("account", 1, Duration::from_millis(50)).unwrap(),
        };
        let limiter = LoginRateLimiter::new(quotas);

        assert_eq!(limiter.admit("alice", "10.0.0.1"), Decision::Admitted);
        assert_eq!(
            limiter.admit("alice", "10.0.0.1"),
            Decision::Rejected(RateLimitTier::Account)
        );
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(limiter.admit("alice", "10.0.0.1"), Decision::Admitted);
    }

    #[test]
    fn concurrent_attempts_never_exceed_burst() {
        let limiter = roomy();
        let admitted = std::sync::atomic::AtomicU32::new(0);

        std::thread::scope(|scope| {
            for t in 0..8 {
                let limiter = &limiter;
                let admitted = &admitted;
                scope.spawn(move || {
                    for _ in 0..10 {
                        let address = format!("10.0.1.{t}");
                        if limiter.admit("target", &address) == Decision::Admitted {
                            admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(
            admitted.load(std::sync::atomic::Ordering::SeqCst),
            ACCOUNT_CAPACITY
        );
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            TierQuota::per_window("account", 0, ACCOUNT_WINDOW),
            Err(RateLimitConfigError::ZeroCapacity("account"))
        );
        assert_eq!(
            TierQuota::per_second("global", 0.0, 5),
            Err(RateLimitConfigError::InvalidPeriod("global"))
        );
    }

    #[test]
    fn default_quotas_match_tiers() {
        let quotas = TierQuotas::with_global(10.0, 50).unwrap();
        assert_eq!(quotas.global.burst(), 50);
        assert_eq!(quotas.address.burst(), ADDRESS_CAPACITY);
        assert_eq!(quotas.account.burst(), ACCOUNT_CAPACITY);
    }

    #[test]
    fn prune_keeps_exhausted_buckets() {
        let limiter = roomy();
        for _ in 0..=ACCOUNT_CAPACITY {
            limiter.admit("alice", "10.0.0.1");
        }
        limiter.prune();
        assert_eq!(
            limiter.admit("alice", "10.0.0.1"),
            Decision::Rejected(RateLimitTier::Account)
        );
    }

    #[tokio::test]
    async fn pruner_stops_on_shutdown() {
        let limiter = Arc::new(roomy());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            LimiterPruner::new(limiter)
                .with_interval(Duration::from_millis(10))
                .run(shutdown.clone()),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        handle.await.unwrap();
    }
}
