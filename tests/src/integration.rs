// ============ Avvy Integration Tests ============
// Full lifecycles across the types, commitment, phase and SDK crates.
//
// Test categories:
// 1. Registration: proofs -> commit -> finalize, progress reporting, batching
// 2. Auction: bid -> commit -> reveal -> results -> claim
// 3. Recovery: bundles reloaded from disk after a restart

use std::sync::Arc;

use avvy_commitment::{opens_to, split_into_batches};
use avvy_phase::AuctionPhase;
use avvy_sdk::events::drain;
use avvy_sdk::{
    AbortHandle, AuctionOrchestrator, BundleStore, ClaimOutcome, EventSink, JsonFileBundleStore,
    MemoryBundleStore, OrchestratorEvent, SdkConfig, WorkflowState,
};
use avvy_types::{AuctionResult, BundleKind, BundleState, ItemValue, ProofKind};

use crate::common::*;

fn progress(events: &[OrchestratorEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::ProofProgress(p) => Some(p.percent),
            _ => None,
        })
        .collect()
}

// ============ Registration ============

#[tokio::test]
async fn test_two_names_need_exactly_four_proofs() {
    let world = make_world(MemoryBundleStore::new());
    let (sink, mut rx) = EventSink::channel();
    let orch = world.registration(SdkConfig::default()).with_events(sink);
    orch.add_to_cart("alpha.avax").await.unwrap();
    orch.add_to_cart("bravo.avax").await.unwrap();

    let mut wf = orch.prepare().await.unwrap();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();

    assert_eq!(wf.state, WorkflowState::ProofsReady);
    assert_eq!(world.prover.prove_calls(), 4);
    assert_eq!(progress(&drain(&mut rx)), vec![0, 25, 50, 75, 100]);

    // Memoized: a second ensure calls the prover zero more times
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
    assert_eq!(world.prover.prove_calls(), 4);
    let cache = orch.proof_cache();
    assert!(cache.lock().await.missing(ProofKind::Pricing, &wf.names()).is_empty());
}

#[tokio::test]
async fn test_registration_lifecycle() {
    let world = make_world(MemoryBundleStore::new());
    world.chain.set_pricing(2, 100);
    let (sink, mut rx) = EventSink::channel();
    let orch = world.registration(SdkConfig::default()).with_events(sink);
    let short = orch.add_to_cart("abcd.avax").await.unwrap();
    let long = orch.add_to_cart("longer.avax").await.unwrap();
    orch.set_quantity(&short, 3).await.unwrap();

    let mut wf = orch.prepare().await.unwrap();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
    orch.commit(&mut wf).await.unwrap();
    let key = wf.key().unwrap();

    let bundle = world.store.get(&key).await.unwrap().unwrap();
    assert_eq!(bundle.state, BundleState::Committed);
    assert_eq!(bundle.kind, BundleKind::Registration);
    assert_eq!(bundle.proofs.len(), 2);
    assert!(opens_to(&key, BundleKind::Registration, &bundle.items, &bundle.proofs, &bundle.salt).unwrap());

    let outcome = orch.finalize(&mut wf).await.unwrap();
    assert_eq!(outcome.names, vec![short.clone(), long.clone()]);
    assert_eq!(wf.state, WorkflowState::Finalized { key });
    assert_eq!(world.store.get(&key).await.unwrap().unwrap().state, BundleState::Revealed);

    // (3 * 16000 + 1 * 500) * 2 + 100 * 2
    assert_eq!(world.chain.last_registration_value(), Some(97_200));
    let preimages = world.chain.last_preimages().unwrap();
    assert_eq!(preimages[0], b"abcd.avax".to_vec());

    let events = drain(&mut rx);
    assert!(events.contains(&OrchestratorEvent::BundleCommitted { key, kind: BundleKind::Registration }));
    assert!(events.contains(&OrchestratorEvent::BundleRevealed { key, kind: BundleKind::Registration }));
}

#[tokio::test]
async fn test_seven_names_finalize_in_two_batches() {
    let world = make_world(MemoryBundleStore::new());
    let orch = world.registration(SdkConfig::default());
    let labels = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf"];
    for label in labels {
        orch.add_to_cart(&format!("{label}.avax")).await.unwrap();
    }

    let mut first = orch.prepare().await.unwrap();
    assert_eq!(first.items.len(), 5);
    assert!(first.has_more);
    orch.ensure_proofs(&mut first, &AbortHandle::new()).await.unwrap();
    orch.commit(&mut first).await.unwrap();
    assert!(orch.finalize(&mut first).await.unwrap().has_more);

    let mut second = orch.prepare().await.unwrap();
    assert_eq!(second.names(), vec![name("foxtrot.avax"), name("golf.avax")]);
    assert!(!second.has_more);
    orch.ensure_proofs(&mut second, &AbortHandle::new()).await.unwrap();
    orch.commit(&mut second).await.unwrap();
    assert!(!orch.finalize(&mut second).await.unwrap().has_more);

    assert_eq!(world.chain.registered().len(), 7);
    assert_eq!(world.chain.registration_calls(), 2);
    assert_eq!(world.prover.prove_calls(), 14);
    assert!(orch.cart_items().await.is_empty());
}

#[tokio::test]
async fn test_enhanced_privacy_registration_sends_no_preimages() {
    let world = make_world(MemoryBundleStore::new());
    let config = SdkConfig { enhanced_privacy: true, ..SdkConfig::default() };
    let orch = world.registration(config);
    orch.add_to_cart("quiet.avax").await.unwrap();

    let mut wf = orch.prepare().await.unwrap();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
    orch.commit(&mut wf).await.unwrap();
    orch.finalize(&mut wf).await.unwrap();
    assert_eq!(world.chain.last_preimages(), None);
}

// ============ Auction ============

#[tokio::test]
async fn test_auction_lifecycle_with_rival() {
    let world = make_world(MemoryBundleStore::new());
    let (sink, mut rx) = EventSink::channel();
    let orch = world.auction(SdkConfig::default()).with_events(sink);
    let won = orch.add_bid("winner.avax", 1_000).await.unwrap();
    let lost = orch.add_bid("loser.avax", 10).await.unwrap();

    assert_eq!(orch.current_phase().await.unwrap(), Some(AuctionPhase::Bidding));
    let mut wf = orch.prepare_bid_batch().await.unwrap();
    orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
    assert_eq!(world.prover.prove_calls(), 2);
    orch.commit_bids(&mut wf).await.unwrap();
    let key = wf.key().unwrap();
    assert!(orch.bids().await.iter().all(|b| b.bundle == Some(key)));

    world.time.set(DURING_REVEAL);
    orch.reveal(&mut wf).await.unwrap();
    assert_eq!(world.chain.revealed().len(), 2);

    world.chain.set_winner(&won, ACCOUNT, 900);
    world.chain.set_winner(&lost, RIVAL, 50);
    let results = orch.load_auction_results().await.unwrap();
    assert_eq!(results.len(), 2);

    world.time.set(DURING_CLAIM);
    let outcome = orch.claim_bundle(&mut wf, &AbortHandle::new()).await.unwrap();
    match outcome {
        ClaimOutcome::Claimed { names, .. } => assert_eq!(names, vec![won.clone()]),
        other => panic!("expected a claim, got {other:?}"),
    }
    assert_eq!(wf.state, WorkflowState::Claimed { key });

    let results = orch.results().await;
    assert!(matches!(&results[&won], AuctionResult::IsClaimed { owner, .. } if owner == ACCOUNT));
    assert_eq!(
        results[&lost],
        AuctionResult::HasWinner { winner: RIVAL.to_string(), auction_price: 50, is_winner: false }
    );

    let transitions: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            OrchestratorEvent::StateChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(transitions, vec!["proofs-ready", "committed", "revealed", "claimed"]);
}

#[tokio::test]
async fn test_bids_commit_in_batches() {
    let world = make_world(MemoryBundleStore::new());
    let config = SdkConfig { max_bid_batch: 3, ..SdkConfig::default() };
    let orch = world.auction(config);
    for i in 0..7u128 {
        orch.add_bid(&format!("bid{i}.avax"), 100 + i).await.unwrap();
    }

    let mut sizes = Vec::new();
    loop {
        let mut wf = match orch.prepare_bid_batch().await {
            Ok(wf) => wf,
            Err(avvy_sdk::SdkError::EmptyBatch) => break,
            Err(e) => panic!("unexpected error: {e}"),
        };
        sizes.push(wf.items.len());
        orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
        orch.commit_bids(&mut wf).await.unwrap();
    }

    let expected: Vec<usize> = split_into_batches(&[0; 7], 3).unwrap().iter().map(Vec::len).collect();
    assert_eq!(sizes, expected);
    assert_eq!(world.chain.bid_commit_count(), 3);
    assert_eq!(world.store.list().await.unwrap().len(), 3);
}

// ============ Recovery ============

#[tokio::test]
async fn test_bundle_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundles.json");
    let world = make_world(JsonFileBundleStore::open(&path).unwrap());

    let key = {
        let orch = world.auction(SdkConfig::default());
        orch.add_bid("durable.avax", 77).await.unwrap();
        let mut wf = orch.prepare_bid_batch().await.unwrap();
        orch.ensure_proofs(&mut wf, &AbortHandle::new()).await.unwrap();
        orch.commit_bids(&mut wf).await.unwrap();
        wf.key().unwrap()
    };

    // New process: nothing in memory but the file
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
    let (wf, _) = orch.reveal_bundle(&key).await.unwrap();
    assert_eq!(wf.state, WorkflowState::Revealed { key });
    assert_eq!(wf.items[0].value, ItemValue::Amount(77));
    assert_eq!(store.get(&key).await.unwrap().unwrap().state, BundleState::Revealed);

    let results = orch.load_auction_results().await.unwrap();
    assert_eq!(results[0].0, name("durable.avax"));
}
