// ============ Phase Clock ============
// Auction phase clock backed by the contract's boundaries.
//
// Boundaries are fetched at most once per TTL. The reported phase never
// moves backwards, even if a later fetch disagrees with an earlier one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use avvy_phase::{AuctionPhase, PhaseBoundaries, PhaseCache};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::ContractClient;
use crate::error::{Result, SdkError};

// ============ Time Sources ============

pub trait TimeSource: Send + Sync {
    /// Seconds since the Unix epoch
    fn now(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Settable clock shared between a test and the code under test
#[derive(Clone, Debug, Default)]
pub struct ManualTime(Arc<AtomicU64>);

impl ManualTime {
    pub fn new(now: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now)))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ============ Clock ============

pub struct PhaseClock<C> {
    client: Arc<C>,
    time: Arc<dyn TimeSource>,
    cache: Mutex<PhaseCache>,
}

impl<C: ContractClient> PhaseClock<C> {
    pub fn new(client: Arc<C>, time: Arc<dyn TimeSource>, ttl_secs: u64) -> Self {
        Self { client, time, cache: Mutex::new(PhaseCache::new(ttl_secs)) }
    }

    pub fn now(&self) -> u64 {
        self.time.now()
    }

    /// Current phase; `None` before bidding opens
    pub async fn current(&self) -> Result<Option<AuctionPhase>> {
        let now = self.time.now();
        let mut cache = self.cache.lock().await;

        if cache.is_stale(now) {
            let raw = self.client.auction_phase_boundaries().await.map_err(SdkError::Client)?;
            let boundaries = PhaseBoundaries::new(raw)?;
            debug!(?raw, "fetched auction boundaries");
            cache.store(boundaries, now);
        } else {
            debug!("auction boundaries served from cache");
        }

        let previous = cache.high_water();
        let phase = cache.phase_at(now).flatten();
        if phase != previous {
            info!(from = ?previous, to = ?phase, "auction phase changed");
        }
        Ok(phase)
    }

    /// Drop cached boundaries and fetch again
    pub async fn refresh(&self) -> Result<Option<AuctionPhase>> {
        self.cache.lock().await.invalidate();
        self.current().await
    }

    /// Fail with `WrongPhase` unless the auction is in `expected`.
    /// A mismatch against cached boundaries is re-checked once against
    /// fresh ones before failing.
    pub async fn require(&self, expected: AuctionPhase) -> Result<()> {
        if self.current().await? == Some(expected) {
            return Ok(());
        }
        let actual = self.refresh().await?;
        if actual == Some(expected) {
            return Ok(());
        }
        Err(SdkError::WrongPhase { expected, actual })
    }
}
