// ============ Avvy Auction Phase Clock ============
// Resolves the sunrise auction phase from four boundary timestamps:
//
//   [bid_start, reveal_start)   BIDDING
//   [reveal_start, claim_start) REVEAL
//   [claim_start, claim_end)    CLAIM
//   [claim_end, ..)             OVER
//
// Before bid_start there is no phase. Boundaries are read from the chain and
// may be cached; `PhaseCache` keeps a snapshot with a TTL and never lets the
// reported phase move backwards.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Error Types ============

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    #[error("auction boundaries must be strictly increasing, got {0:?}")]
    Unordered([u64; 4]),
}

// ============ Phase ============

/// Declaration order is chronological; `Ord` follows it
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuctionPhase {
    Bidding,
    Reveal,
    Claim,
    Over,
}

impl fmt::Display for AuctionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuctionPhase::Bidding => "bidding",
            AuctionPhase::Reveal => "reveal",
            AuctionPhase::Claim => "claim",
            AuctionPhase::Over => "over",
        };
        f.write_str(label)
    }
}

// ============ Boundaries ============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseBoundaries {
    pub bid_start: u64,
    pub reveal_start: u64,
    pub claim_start: u64,
    pub claim_end: u64,
}

impl PhaseBoundaries {
    pub fn new(raw: [u64; 4]) -> Result<Self, PhaseError> {
        let [bid_start, reveal_start, claim_start, claim_end] = raw;
        if !(bid_start < reveal_start && reveal_start < claim_start && claim_start < claim_end) {
            return Err(PhaseError::Unordered(raw));
        }
        Ok(Self { bid_start, reveal_start, claim_start, claim_end })
    }

    pub fn as_array(&self) -> [u64; 4] {
        [self.bid_start, self.reveal_start, self.claim_start, self.claim_end]
    }

    pub fn phase_at(&self, now: u64) -> Option<AuctionPhase> {
        current_phase(self, now)
    }

    /// Anywhere between bid_start and claim_end
    pub fn is_auction_period(&self, now: u64) -> bool {
        now >= self.bid_start && now < self.claim_end
    }

    pub fn is_bidding_open(&self, now: u64) -> bool {
        current_phase(self, now) == Some(AuctionPhase::Bidding)
    }

    /// Seconds until the next boundary, `None` once the auction is over
    pub fn next_boundary(&self, now: u64) -> Option<u64> {
        self.as_array().into_iter().find(|t| *t > now).map(|t| t - now)
    }
}

/// Pure phase resolution; `None` before bidding opens
pub fn current_phase(boundaries: &PhaseBoundaries, now: u64) -> Option<AuctionPhase> {
    if now < boundaries.bid_start {
        None
    } else if now < boundaries.reveal_start {
        Some(AuctionPhase::Bidding)
    } else if now < boundaries.claim_start {
        Some(AuctionPhase::Reveal)
    } else if now < boundaries.claim_end {
        Some(AuctionPhase::Claim)
    } else {
        Some(AuctionPhase::Over)
    }
}

// ============ Cache ============

#[derive(Clone, Copy, Debug)]
struct Snapshot {
    boundaries: PhaseBoundaries,
    fetched_at: u64,
}

/// Boundary snapshot with a TTL plus a high-water mark on reported phases
#[derive(Clone, Debug)]
pub struct PhaseCache {
    ttl_secs: u64,
    snapshot: Option<Snapshot>,
    high_water: Option<AuctionPhase>,
}

impl PhaseCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self { ttl_secs, snapshot: None, high_water: None }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn boundaries(&self) -> Option<PhaseBoundaries> {
        self.snapshot.map(|s| s.boundaries)
    }

    pub fn is_stale(&self, now: u64) -> bool {
        match self.snapshot {
            None => true,
            Some(s) => now.saturating_sub(s.fetched_at) >= self.ttl_secs,
        }
    }

    pub fn store(&mut self, boundaries: PhaseBoundaries, now: u64) {
        self.snapshot = Some(Snapshot { boundaries, fetched_at: now });
    }

    /// Drop the snapshot but keep the high-water mark
    pub fn invalidate(&mut self) {
        self.snapshot = None;
    }

    /// Phase from the cached snapshot, never earlier than one already
    /// reported. Outer `None` means there is no snapshot.
    pub fn phase_at(&mut self, now: u64) -> Option<Option<AuctionPhase>> {
        let snapshot = self.snapshot?;
        let computed = current_phase(&snapshot.boundaries, now);
        let phase = computed.max(self.high_water);
        self.high_water = phase;
        Some(phase)
    }

    pub fn high_water(&self) -> Option<AuctionPhase> {
        self.high_water
    }
}

// ============ Tests ============
