// ============ Avvy SDK ============
// Commit-reveal orchestration for .avax names
// Drives sunrise auction bids (commit, reveal, claim) and direct
// registrations (commit, finalize) against a contract client and a prover,
// persisting every salt before it is committed on-chain.

pub mod auction;
pub mod cart;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
mod flow;
pub mod phase_clock;
pub mod pricing;
pub mod proofs;
pub mod registration;
pub mod session;
pub mod state;
pub mod store;
pub mod submit;
pub mod wavax;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use auction::{AuctionOrchestrator, ClaimOutcome};
pub use cart::{BidEntry, BidSet, BulkImportReport, Cart, SkippedBid};
pub use client::{ContractClient, Preimage, ProofResult, ProofService, RevealedBid, WinningBid};
pub use config::SdkConfig;
pub use error::{ClientError, ProverError, Result, SdkError};
pub use events::{EventSink, OrchestratorEvent, ProofProgress};
pub use phase_clock::{ManualTime, PhaseClock, SystemTimeSource, TimeSource};
pub use proofs::{AbortHandle, ProofCache, ProofGenerator, SharedProofCache};
pub use registration::{FinalizeOutcome, RegistrationOrchestrator};
pub use session::{Session, SessionEvent};
pub use state::{transition, Action, Recovery, Workflow, WorkflowState};
pub use store::{BundleStore, JsonFileBundleStore, MemoryBundleStore, StoreError};
pub use wavax::WavaxStatus;

// ============ Tests ============
