// ============ Shared Fixtures ============

use std::sync::Arc;

use avvy_sdk::testing::{FakeChain, FakeProver, ManualTime};
use avvy_sdk::{AuctionOrchestrator, BundleStore, RegistrationOrchestrator, SdkConfig, Session};
use avvy_types::Name;

pub const ACCOUNT: &str = "0x00000000000000000000000000000000000000a1";
pub const RIVAL: &str = "0x00000000000000000000000000000000000000b2";

/// bid [1000, 2000), reveal [2000, 3000), claim [3000, 4000)
pub const BOUNDS: [u64; 4] = [1_000, 2_000, 3_000, 4_000];
pub const DURING_BIDDING: u64 = 1_500;
pub const DURING_REVEAL: u64 = 2_500;
pub const DURING_CLAIM: u64 = 3_500;

pub struct World<S> {
    pub chain: Arc<FakeChain>,
    pub prover: Arc<FakeProver>,
    pub store: Arc<S>,
    pub time: ManualTime,
    pub session: Arc<Session>,
}

pub fn make_world<S: BundleStore>(store: S) -> World<S> {
    let session = Arc::new(Session::new(SdkConfig::default().chain_id));
    session.connect(ACCOUNT, SdkConfig::default().chain_id).unwrap();
    World {
        chain: Arc::new(FakeChain::new(BOUNDS)),
        prover: Arc::new(FakeProver::new()),
        store: Arc::new(store),
        time: ManualTime::new(DURING_BIDDING),
        session,
    }
}

impl<S: BundleStore> World<S> {
    pub fn auction(&self, config: SdkConfig) -> AuctionOrchestrator<FakeChain, FakeProver, S> {
        AuctionOrchestrator::new(
            config,
            Arc::clone(&self.session),
            Arc::clone(&self.chain),
            Arc::clone(&self.prover),
            Arc::clone(&self.store),
        )
        .with_time_source(Arc::new(self.time.clone()))
    }

    pub fn registration(&self, config: SdkConfig) -> RegistrationOrchestrator<FakeChain, FakeProver, S> {
        RegistrationOrchestrator::new(
            config,
            Arc::clone(&self.session),
            Arc::clone(&self.chain),
            Arc::clone(&self.prover),
            Arc::clone(&self.store),
        )
        .with_time_source(Arc::new(self.time.clone()))
    }
}

pub fn name(s: &str) -> Name {
    Name::parse(s).unwrap()
}
