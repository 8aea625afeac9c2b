// ============ Avvy Adversarial Tests ============
// Failure paths of the commit-reveal orchestrators.
//
// Each test injects one fault (a tampered bundle, a declined wallet prompt,
// a reverted transaction, the wrong auction phase, a duplicate submission,
// a bad proof, an abort) and checks that no bundle is lost or advanced past
// what the chain actually confirmed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use avvy_phase::AuctionPhase;
use avvy_sdk::store::{read_bundle_file, write_bundle_file};
use avvy_sdk::testing::{FakeChain, FakeProver};
use avvy_sdk::{
    AbortHandle, AuctionOrchestrator, BundleStore, ClaimOutcome, ClientError, JsonFileBundleStore,
    MemoryBundleStore, Recovery, SdkConfig, SdkError, Session, StoreError, Workflow, WorkflowState,
};
use avvy_types::{Bundle, BundleState, Hash32, Item, ProofKind, ValidationError};

use crate::common::*;

/// Bid on `label`, prove, and commit during bidding
async fn committed_bid<S: BundleStore>(
    orch: &AuctionOrchestrator<FakeChain, FakeProver, S>,
    label: &str,
    amount: u128,
) -> Workflow {
    orch.add_bid(label, amount).await.unwrap();
    let mut wf = orch.prepare_bid_batch().await.unwrap();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
    orch.commit_bids(&mut wf).await.unwrap();
    wf
}

/// Memory store whose next state change fails once
#[derive(Default)]
struct FlakyStore {
    inner: MemoryBundleStore,
    fail_next_advance: AtomicBool,
}

impl FlakyStore {
    fn fail_next_advance(&self) {
        self.fail_next_advance.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BundleStore for FlakyStore {
    async fn insert(&self, bundle: Bundle) -> Result<(), StoreError> {
        self.inner.insert(bundle).await
    }

    async fn get(&self, key: &Hash32) -> Result<Option<Bundle>, StoreError> {
        self.inner.get(key).await
    }

    async fn advance(&self, key: &Hash32, state: BundleState) -> Result<Bundle, StoreError> {
        if self.fail_next_advance.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
        }
        self.inner.advance(key, state).await
    }

    async fn list(&self) -> Result<Vec<Bundle>, StoreError> {
        self.inner.list().await
    }
}

// ============ Commitment Integrity ============

#[tokio::test]
async fn test_tampered_bundle_is_not_revealed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundles.json");
    let world = make_world(JsonFileBundleStore::open(&path).unwrap());
    let key = {
        let orch = world.auction(SdkConfig::default());
        committed_bid(&orch, "target.avax", 500).await.key().unwrap()
    };

    // Someone edits the amount on disk
    let mut bundles = read_bundle_file(&path).unwrap();
    bundles[0].items[0] = Item::bid(name("target.avax"), 5);
    write_bundle_file(&path, &bundles).unwrap();

    let store = Arc::new(JsonFileBundleStore::open(&path).unwrap());
    let orch = AuctionOrchestrator::new(
        SdkConfig::default(),
        Arc::clone(&world.session),
        Arc::clone(&world.chain),
        Arc::clone(&world.prover),
        Arc::clone(&store),
    )
    .with_time_source(Arc::new(world.time.clone()));

    world.time.set(DURING_REVEAL);
    let bundle = store.get(&key).await.unwrap().unwrap();
    let mut wf = Workflow::resume(&bundle);
    let err = orch.reveal(&mut wf).await.unwrap_err();

    assert!(matches!(err, SdkError::CommitmentMismatch { expected, .. } if expected == key));
    assert!(!err.is_retryable());
    assert!(matches!(
        &wf.state,
        WorkflowState::Error { recovery: Recovery::InspectBundle { key: k }, .. } if *k == key
    ));
    assert!(wf.retry().is_err());
    assert_eq!(store.get(&key).await.unwrap().unwrap().state, BundleState::Committed);
    assert_eq!(world.chain.reveal_calls(), 0);
}

// ============ Wallet Rejection ============

#[tokio::test]
async fn test_declined_commit_keeps_proofs_ready() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.auction(SdkConfig::default());
    orch.add_bid("shy.avax", 10).await.unwrap();
    let mut wf = orch.prepare_bid_batch().await.unwrap();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();

    world.chain.reject_next();
    let err = orch.commit_bids(&mut wf).await.unwrap_err();
    assert!(matches!(err, SdkError::UserRejected));
    assert_eq!(wf.state, WorkflowState::ProofsReady);
    assert_eq!(world.chain.bid_commit_count(), 0);

    // The salt was persisted before the prompt; the orphan stays uncommitted
    let stored = world.store.list().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].state, BundleState::Uncommitted);

    // User tries again: a fresh salt, a fresh bundle
    orch.commit_bids(&mut wf).await.unwrap();
    assert_eq!(world.store.list().await.unwrap().len(), 2);
    assert_eq!(world.chain.bid_commit_count(), 1);
}

#[tokio::test]
async fn test_declined_finalize_keeps_cart_and_commitment() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.registration(SdkConfig::default());
    orch.add_to_cart("patient.avax").await.unwrap();
    let mut wf = orch.prepare().await.unwrap();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
    orch.commit(&mut wf).await.unwrap();
    let key = wf.key().unwrap();

    world.chain.reject_next();
    assert!(matches!(orch.finalize(&mut wf).await, Err(SdkError::UserRejected)));
    assert_eq!(wf.state, WorkflowState::Committed { key });
    assert_eq!(orch.cart_items().await.len(), 1);

    orch.finalize(&mut wf).await.unwrap();
    assert!(orch.cart_items().await.is_empty());
}

// ============ Transaction Failure ============

#[tokio::test]
async fn test_failed_reveal_is_not_retried_automatically() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.auction(SdkConfig::default());
    let mut wf = committed_bid(&orch, "bumpy.avax", 42).await;
    let key = wf.key().unwrap();
    let attempts = world.chain.tx_attempts();

    world.time.set(DURING_REVEAL);
    world.chain.fail_next(ClientError::with_code(-32000, "nonce too low"));
    let err = orch.reveal(&mut wf).await.unwrap_err();
    assert!(matches!(err, SdkError::TransactionFailed(ref cause) if cause.code == Some(-32000)));
    assert!(err.is_retryable());
    assert_eq!(world.chain.tx_attempts(), attempts + 1);
    assert!(matches!(wf.state, WorkflowState::Error { recovery: Recovery::RetryReveal { .. }, .. }));
    assert_eq!(world.store.get(&key).await.unwrap().unwrap().state, BundleState::Committed);

    // Reveal from the error state is refused until the user retries
    assert!(matches!(orch.reveal(&mut wf).await, Err(SdkError::InvalidTransition { .. })));
    assert_eq!(world.chain.tx_attempts(), attempts + 1);

    wf.retry().unwrap();
    orch.reveal(&mut wf).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Revealed { key });
}

// ============ Phase Enforcement ============

#[tokio::test]
async fn test_actions_outside_their_phase() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.auction(SdkConfig::default());
    let mut wf = committed_bid(&orch, "early.avax", 1).await;

    let err = orch.reveal(&mut wf).await.unwrap_err();
    assert!(matches!(
        err,
        SdkError::WrongPhase { expected: AuctionPhase::Reveal, actual: Some(AuctionPhase::Bidding) }
    ));
    assert!(matches!(wf.state, WorkflowState::Committed { .. }));

    world.time.set(DURING_REVEAL);
    let err = orch.claim_all(&AbortHandle::new()).await.unwrap_err();
    assert!(matches!(err, SdkError::WrongPhase { expected: AuctionPhase::Claim, .. }));

    // Before the auction starts there is no phase at all
    let fresh = make_world(MemoryBundleStore::new());
    fresh.time.set(500);
    assert_eq!(fresh.auction(SdkConfig::default()).current_phase().await.unwrap(), None);
}

#[tokio::test]
async fn test_phase_never_regresses() {
    let world = make_world(MemoryBundleStore::new());
    world.time.set(DURING_REVEAL);
    let orch = world.auction(SdkConfig::default());
    assert_eq!(orch.current_phase().await.unwrap(), Some(AuctionPhase::Reveal));

    // A later fetch claims bidding is still open
    world.chain.set_boundaries([1_000, 5_000, 6_000, 7_000]);
    world.time.advance(600);
    assert_eq!(orch.current_phase().await.unwrap(), Some(AuctionPhase::Reveal));
    assert_eq!(world.chain.boundary_fetches(), 2);
}

// ============ Duplicate Submission ============

#[tokio::test]
async fn test_concurrent_reveal_of_same_bundle() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.auction(SdkConfig::default());
    let wf = committed_bid(&orch, "racy.avax", 9).await;
    let key = wf.key().unwrap();

    world.time.set(DURING_REVEAL);
    world.chain.set_delay(Duration::from_millis(20));
    let mut a = wf.clone();
    let mut b = wf;
    let (ra, rb) = tokio::join!(orch.reveal(&mut a), orch.reveal(&mut b));

    let outcomes = [ra.is_ok(), rb.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let err = ra.err().or(rb.err()).unwrap();
    assert!(matches!(err, SdkError::SubmissionInFlight(k) if k == key));
    assert_eq!(world.chain.reveal_calls(), 1);

    // Once landed, a replay is refused by the bundle state
    let bundle = world.store.get(&key).await.unwrap().unwrap();
    let mut replay = Workflow::resume(&bundle);
    replay.state = WorkflowState::Committed { key };
    assert!(matches!(orch.reveal(&mut replay).await, Err(SdkError::BundleState { .. })));
}

#[tokio::test]
async fn test_concurrent_commit_of_same_batch() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.auction(SdkConfig::default());
    orch.add_bid("twice.avax", 77).await.unwrap();
    let mut a = orch.prepare_bid_batch().await.unwrap();
    orch.ensure_proofs(&mut a, &AbortHandle::new()).await.unwrap();
    let mut b = a.clone();

    world.chain.set_delay(Duration::from_millis(20));
    let (ra, rb) = tokio::join!(orch.commit_bids(&mut a), orch.commit_bids(&mut b));

    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let err = ra.err().or(rb.err()).unwrap();
    assert!(matches!(err, SdkError::SubmissionInFlight(_)));
    assert_eq!(world.chain.bid_commit_count(), 1);
    assert_eq!(world.store.list().await.unwrap().len(), 1);

    // The losing copy is still ProofsReady, but its bids are sealed now
    let mut loser = if a.state == WorkflowState::ProofsReady { a } else { b };
    assert!(matches!(orch.commit_bids(&mut loser).await, Err(SdkError::InvalidTransition { .. })));
    assert_eq!(world.chain.bid_commit_count(), 1);
}

#[tokio::test]
async fn test_concurrent_registration_commit_of_same_batch() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.registration(SdkConfig::default());
    orch.add_to_cart("twice.avax").await.unwrap();
    let mut a = orch.prepare().await.unwrap();
    orch.ensure_proofs(&mut a, &AbortHandle::new()).await.unwrap();
    let mut b = a.clone();

    world.chain.set_delay(Duration::from_millis(20));
    let (ra, rb) = tokio::join!(orch.commit(&mut a), orch.commit(&mut b));

    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert!(matches!(ra.err().or(rb.err()), Some(SdkError::SubmissionInFlight(_))));
    assert_eq!(world.chain.registration_commit_count(), 1);
}

// ============ Local Store Failure ============

#[tokio::test]
async fn test_commit_confirmed_but_not_recorded_can_still_be_revealed() {
    let world = make_world(FlakyStore::default());
    let orch = world.auction(SdkConfig::default());
    orch.add_bid("stranded.avax", 31).await.unwrap();
    let mut wf = orch.prepare_bid_batch().await.unwrap();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();

    world.store.fail_next_advance();
    let err = orch.commit_bids(&mut wf).await.unwrap_err();
    assert!(matches!(err, SdkError::Store(StoreError::Io(_))));
    assert_eq!(world.chain.bid_commit_count(), 1);

    // The chain has it, so the workflow does too; the record lags behind
    let key = wf.key().unwrap();
    assert_eq!(wf.state, WorkflowState::Committed { key });
    assert_eq!(world.store.get(&key).await.unwrap().unwrap().state, BundleState::Uncommitted);

    // After a restart, the lagging record is revealed by key
    world.time.set(DURING_REVEAL);
    let (resumed, _) = orch.reveal_bundle(&key).await.unwrap();
    assert_eq!(resumed.state, WorkflowState::Revealed { key });
    assert_eq!(world.store.get(&key).await.unwrap().unwrap().state, BundleState::Revealed);
    assert_eq!(world.chain.reveal_calls(), 1);
}

#[tokio::test]
async fn test_registration_confirmed_but_not_recorded_can_still_be_finalized() {
    let world = make_world(FlakyStore::default());
    let orch = world.registration(SdkConfig::default());
    orch.add_to_cart("stranded.avax").await.unwrap();
    let mut wf = orch.prepare().await.unwrap();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();

    world.store.fail_next_advance();
    assert!(matches!(orch.commit(&mut wf).await, Err(SdkError::Store(_))));
    let key = wf.key().unwrap();
    assert_eq!(wf.state, WorkflowState::Committed { key });

    let (resumed, _) = orch.finalize_bundle(&key).await.unwrap();
    assert!(matches!(resumed.state, WorkflowState::Finalized { .. }));
    assert_eq!(world.chain.registration_calls(), 1);
    assert!(orch.cart_items().await.is_empty());
}

// ============ Proofs ============

#[tokio::test]
async fn test_bad_proof_is_not_cached_and_retry_resumes() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.registration(SdkConfig::default());
    orch.add_to_cart("alpha.avax").await.unwrap();
    let bravo = orch.add_to_cart("bravo.avax").await.unwrap();
    world.prover.fail_verification_for(&bravo);

    let mut wf = orch.prepare().await.unwrap();
    let err = orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap_err();
    assert!(matches!(err, SdkError::ProofVerificationFailed { kind: ProofKind::Pricing, .. }));
    assert!(matches!(wf.state, WorkflowState::Error { recovery: Recovery::RetryProofs, .. }));
    assert_eq!(world.prover.prove_calls(), 3);

    let cache = orch.proof_cache();
    assert_eq!(cache.lock().await.missing(ProofKind::Pricing, &wf.names()), vec![bravo.clone()]);
    assert!(matches!(orch.commit(&mut wf).await, Err(SdkError::InvalidTransition { .. })));

    world.prover.clear_failures();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
    assert_eq!(wf.state, WorkflowState::ProofsReady);
    assert_eq!(world.prover.prove_calls(), 5);
}

#[tokio::test]
async fn test_abort_between_proofs() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.registration(SdkConfig::default());
    orch.add_to_cart("alpha.avax").await.unwrap();
    orch.add_to_cart("bravo.avax").await.unwrap();

    let abort = AbortHandle::new();
    world.prover.abort_after(1, abort.clone());
    let mut wf = orch.prepare().await.unwrap();
    let err = orch.ensure_proofs(&mut wf, &abort).await.unwrap_err();

    assert!(matches!(err, SdkError::Aborted));
    assert_eq!(wf.state, WorkflowState::AwaitingProofs);
    assert_eq!(world.prover.prove_calls(), 1);
    assert_eq!(orch.proof_cache().lock().await.len(), 1);

    world.prover.abort_after(usize::MAX, AbortHandle::new());
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
    assert_eq!(world.prover.prove_calls(), 4);
}

// ============ Input Validation ============

#[tokio::test]
async fn test_invalid_and_blocked_names_never_reach_the_chain() {
    let world = make_world(MemoryBundleStore::new());
    let mut blocked = HashSet::new();
    blocked.insert(name("reserved.avax").hash());
    let orch = world.auction(SdkConfig::default()).with_blocklist(Arc::new(blocked));

    assert!(matches!(orch.add_bid("ab.avax", 1).await, Err(SdkError::Validation(ValidationError::Length(2)))));
    assert!(matches!(orch.add_bid("avvy.eth", 1).await, Err(SdkError::Validation(ValidationError::Namespace(_)))));
    assert!(matches!(orch.add_bid("Reserved.avax", 1).await, Err(SdkError::Validation(ValidationError::Blocked))));
    assert!(matches!(orch.prepare_bid_batch().await, Err(SdkError::EmptyBatch)));
    assert_eq!(world.chain.tx_attempts(), 0);
}

#[tokio::test]
async fn test_loser_has_nothing_to_claim() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.auction(SdkConfig::default());
    let mut wf = committed_bid(&orch, "contested.avax", 5).await;
    world.time.set(DURING_REVEAL);
    orch.reveal(&mut wf).await.unwrap();
    world.chain.set_winner(&name("contested.avax"), RIVAL, 5);
    orch.load_auction_results().await.unwrap();

    world.time.set(DURING_CLAIM);
    assert_eq!(orch.claim_bundle(&mut wf, &AbortHandle::new()).await.unwrap(), ClaimOutcome::NothingToClaim);
    assert!(matches!(wf.state, WorkflowState::Revealed { .. }));
    assert_eq!(world.chain.claim_calls(), 0);
}

#[tokio::test]
async fn test_wrong_chain_and_disconnect() {
    let session = Session::new(43114);
    assert!(matches!(session.connect(ACCOUNT, 1), Err(SdkError::WrongChain { .. })));

    let world = make_world(MemoryBundleStore::new());
    let orch = world.auction(SdkConfig::default());
    world.session.disconnect();
    assert!(matches!(orch.load_auction_results().await, Err(SdkError::NotConnected)));
}
