// ============ Sunrise Auction ============
// Bids are sealed in batches during BIDDING (commit), opened during REVEAL
// and, for names the account won, claimed during CLAIM. Each batch is a
// `Workflow`; its salt and items are persisted before the commit
// transaction so the bid can always be revealed later.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use avvy_commitment::{batch_key, bid_commitment, generate_salt, next_batch};
use avvy_phase::AuctionPhase;
use avvy_types::{
    AuctionResult, Blocklist, Bundle, BundleKind, BundleState, Hash32, Name, NoBlocklist, ProofKind,
    TxReceipt,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cart::{BidEntry, BidSet, BulkImportReport};
use crate::client::{ContractClient, ProofService};
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::events::{EventSink, OrchestratorEvent};
use crate::flow::{advance, ensure_workflow_proofs, expect_state, invalid_action, persist_state, record_failure};
use crate::phase_clock::{PhaseClock, SystemTimeSource, TimeSource};
use crate::pricing::name_price_usd_cents;
use crate::proofs::{AbortHandle, ProofCache, ProofGenerator, SharedProofCache};
use crate::session::Session;
use crate::state::{Action, Workflow, WorkflowState};
use crate::store::BundleStore;
use crate::submit::{classify, InFlight};
use crate::wavax::WavaxStatus;

/// Auction bids only need the constraints proof, and only to claim
const AUCTION_PROOF_KINDS: [ProofKind; 1] = [ProofKind::Constraints];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed { names: Vec<Name>, receipt: TxReceipt },
    /// Proofs were missing; they have been generated and the claim can be sent again
    Deferred { missing: Vec<Name> },
    NothingToClaim,
}

pub struct AuctionOrchestrator<C, P, S> {
    config: SdkConfig,
    session: Arc<Session>,
    client: Arc<C>,
    proofs: ProofGenerator<P>,
    cache: SharedProofCache,
    store: Arc<S>,
    clock: PhaseClock<C>,
    events: EventSink,
    inflight: InFlight,
    blocklist: Arc<dyn Blocklist + Send + Sync>,
    bids: Mutex<BidSet>,
    results: Mutex<BTreeMap<Name, AuctionResult>>,
}

impl<C, P, S> AuctionOrchestrator<C, P, S>
where
    C: ContractClient,
    P: ProofService,
    S: BundleStore,
{
    pub fn new(config: SdkConfig, session: Arc<Session>, client: Arc<C>, prover: Arc<P>, store: Arc<S>) -> Self {
        let clock = PhaseClock::new(Arc::clone(&client), Arc::new(SystemTimeSource), config.phase_cache_ttl_secs);
        Self {
            config,
            session,
            client,
            proofs: ProofGenerator::new(prover),
            cache: ProofCache::shared(),
            store,
            clock,
            events: EventSink::disabled(),
            inflight: InFlight::new(),
            blocklist: Arc::new(NoBlocklist),
            bids: Mutex::new(BidSet::new()),
            results: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.clock = PhaseClock::new(Arc::clone(&self.client), time, self.config.phase_cache_ttl_secs);
        self
    }

    /// Share memoized proofs with another orchestrator
    pub fn with_proof_cache(mut self, cache: SharedProofCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_blocklist(mut self, blocklist: Arc<dyn Blocklist + Send + Sync>) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn proof_cache(&self) -> SharedProofCache {
        Arc::clone(&self.cache)
    }

    pub async fn current_phase(&self) -> Result<Option<AuctionPhase>> {
        self.clock.current().await
    }

    // ============ Bids ============

    pub async fn add_bid(&self, name: &str, amount: u128) -> Result<Name> {
        let name = Name::parse_with(&name.to_lowercase(), self.blocklist.as_ref())?;
        self.bids.lock().await.add(name.clone(), amount)?;
        debug!(%name, amount, "bid added");
        Ok(name)
    }

    pub async fn remove_bid(&self, name: &Name) -> Result<bool> {
        self.bids.lock().await.remove(name)
    }

    pub async fn import_bids(&self, json: &str) -> Result<BulkImportReport> {
        self.bids.lock().await.import_bulk(json, self.blocklist.as_ref())
    }

    pub async fn bids(&self) -> Vec<BidEntry> {
        self.bids.lock().await.entries().to_vec()
    }

    /// Next batch of unsealed bids, at most `max_bid_batch` long
    pub async fn prepare_bid_batch(&self) -> Result<Workflow> {
        let pending = self.bids.lock().await.unsubmitted();
        if pending.is_empty() {
            return Err(SdkError::EmptyBatch);
        }
        let (batch, has_more) = next_batch(&pending, self.config.max_bid_batch)?;
        Ok(Workflow::new(BundleKind::Auction, batch, has_more))
    }

    pub async fn ensure_proofs(&self, wf: &mut Workflow, abort: &AbortHandle) -> Result<()> {
        ensure_workflow_proofs(&self.proofs, &self.cache, wf, &AUCTION_PROOF_KINDS, &self.events, abort).await
    }

    // ============ Commit ============

    /// Seal the batch. The bundle (with its salt) is stored before the
    /// transaction is sent. Once the chain confirms, the workflow is
    /// `Committed` even if recording that locally fails.
    pub async fn commit_bids(&self, wf: &mut Workflow) -> Result<TxReceipt> {
        expect_state(wf, wf.state == WorkflowState::ProofsReady, "commit")?;
        if !self.session.is_connected() {
            return Err(SdkError::NotConnected);
        }
        self.clock.require(AuctionPhase::Bidding).await?;

        // Same batch, any salt: one commit at a time
        let _batch_guard = self.inflight.begin(batch_key(BundleKind::Auction, &wf.items))?;
        self.bids.lock().await.ensure_unsealed(&wf.names())?;

        let salt = generate_salt();
        let key = bid_commitment(&wf.items, &salt)?;
        self.store
            .insert(Bundle {
                key,
                kind: BundleKind::Auction,
                items: wf.items.clone(),
                proofs: Vec::new(),
                salt,
                state: BundleState::Uncommitted,
                created_at: self.clock.now(),
            })
            .await?;

        let _guard = self.inflight.begin(key)?;
        info!(key = %key.short(), bids = wf.items.len(), "submitting bid commitment");
        let receipt = match self.client.submit_bid_commit(&key).await {
            Ok(receipt) => receipt,
            Err(e) => {
                let err = classify(e, self.config.user_rejected_code);
                return Err(record_failure(wf, err, &self.events));
            }
        };

        self.bids.lock().await.assign_bundle(&wf.names(), key);
        advance(wf, Action::Committed { key }, &self.events)?;
        self.events.emit(OrchestratorEvent::BundleCommitted { key, kind: BundleKind::Auction });
        persist_state(self.store.mark_committed(&key).await, &key)?;
        Ok(receipt)
    }

    // ============ Reveal ============

    /// Open a committed batch with exactly the recorded items and salt
    pub async fn reveal(&self, wf: &mut Workflow) -> Result<TxReceipt> {
        let WorkflowState::Committed { key } = wf.state else {
            return Err(invalid_action(wf, "reveal"));
        };
        self.clock.require(AuctionPhase::Reveal).await?;
        let _guard = self.inflight.begin(key)?;

        let bundle = self.store.get(&key).await?.ok_or(SdkError::BundleNotFound(key))?;
        // An uncommitted record may still be on-chain; the contract decides
        if bundle.state == BundleState::Revealed {
            return Err(SdkError::BundleState { key, expected: BundleState::Committed, actual: bundle.state });
        }

        let actual = bid_commitment(&bundle.items, &bundle.salt)?;
        if actual != key {
            let err = SdkError::CommitmentMismatch { expected: key, actual };
            return Err(record_failure(wf, err, &self.events));
        }

        info!(key = %key.short(), enhanced_privacy = self.config.enhanced_privacy, "revealing bids");
        let submitted = if self.config.enhanced_privacy {
            self.client.submit_reveal(&bundle.items, &bundle.salt).await
        } else {
            match self.client.build_preimages(&bundle.names()).await {
                Ok(preimages) => {
                    self.client
                        .submit_reveal_with_preimage(&bundle.items, &bundle.salt, &preimages)
                        .await
                }
                Err(e) => Err(e),
            }
        };
        let receipt = match submitted {
            Ok(receipt) => receipt,
            Err(e) => {
                let err = classify(e, self.config.user_rejected_code);
                return Err(record_failure(wf, err, &self.events));
            }
        };

        advance(wf, Action::Revealed, &self.events)?;
        self.events.emit(OrchestratorEvent::BundleRevealed { key, kind: BundleKind::Auction });
        persist_state(self.store.mark_revealed(&key).await, &key)?;
        Ok(receipt)
    }

    /// Reveal a stored bundle by key, e.g. after a restart
    pub async fn reveal_bundle(&self, key: &Hash32) -> Result<(Workflow, TxReceipt)> {
        let bundle = self.store.get(key).await?.ok_or(SdkError::BundleNotFound(*key))?;
        if bundle.kind != BundleKind::Auction {
            return Err(SdkError::BundleNotFound(*key));
        }
        let mut wf = Workflow::resume_onchain(&bundle);
        let receipt = self.reveal(&mut wf).await?;
        Ok((wf, receipt))
    }

    // ============ Results ============

    /// Load the outcome of every auction the account revealed a bid in
    pub async fn load_auction_results(&self) -> Result<Vec<(Name, AuctionResult)>> {
        let account = self.session.account()?;
        let revealed = self.client.revealed_bids().await.map_err(SdkError::Client)?;
        let known = self.known_names().await?;

        let mut loaded = Vec::new();
        for bid in revealed {
            let Some(name) = bid.name.or_else(|| known.get(&bid.name_hash).cloned()) else {
                debug!(hash = %bid.name_hash.short(), "revealed bid for unknown name");
                continue;
            };
            let result = match self.client.winning_bid(&name).await.map_err(SdkError::Client)? {
                None => AuctionResult::NoWinner,
                Some(w) => {
                    let is_winner = w.winner.eq_ignore_ascii_case(&account);
                    match w.owner {
                        Some(owner) => AuctionResult::IsClaimed {
                            owner,
                            winner: w.winner,
                            auction_price: w.auction_price,
                            is_winner,
                        },
                        None => AuctionResult::HasWinner {
                            winner: w.winner,
                            auction_price: w.auction_price,
                            is_winner,
                        },
                    }
                }
            };
            loaded.push((name, result));
        }

        let mut results = self.results.lock().await;
        for (name, result) in &loaded {
            results.insert(name.clone(), result.clone());
        }
        info!(count = loaded.len(), "auction results loaded");
        self.events.emit(OrchestratorEvent::ResultsLoaded { count: loaded.len() });
        Ok(loaded)
    }

    pub async fn results(&self) -> BTreeMap<Name, AuctionResult> {
        self.results.lock().await.clone()
    }

    async fn known_names(&self) -> Result<HashMap<Hash32, Name>> {
        let mut known: HashMap<Hash32, Name> = self
            .bids
            .lock()
            .await
            .entries()
            .iter()
            .map(|e| (e.name.hash(), e.name.clone()))
            .collect();
        for bundle in self.store.list().await? {
            for name in bundle.names() {
                known.insert(name.hash(), name);
            }
        }
        Ok(known)
    }

    // ============ Claim ============

    /// Claim the won, unclaimed names among `names`.
    ///
    /// If any of them lacks a constraints proof, the proofs are generated
    /// and the claim is deferred instead of sent.
    pub async fn claim(&self, names: &[Name], abort: &AbortHandle) -> Result<ClaimOutcome> {
        let account = self.session.account()?;
        self.clock.require(AuctionPhase::Claim).await?;

        let claimable: Vec<Name> = {
            let results = self.results.lock().await;
            names
                .iter()
                .filter(|n| results.get(n).map_or(false, AuctionResult::is_claimable))
                .cloned()
                .collect()
        };
        if claimable.is_empty() {
            return Ok(ClaimOutcome::NothingToClaim);
        }

        let missing = self.cache.lock().await.missing(ProofKind::Constraints, &claimable);
        if !missing.is_empty() {
            info!(missing = missing.len(), "claim deferred until proofs exist");
            self.events.emit(OrchestratorEvent::ClaimDeferred { missing: missing.clone() });
            self.proofs
                .ensure(&self.cache, &missing, &AUCTION_PROOF_KINDS, &self.events, abort)
                .await?;
            return Ok(ClaimOutcome::Deferred { missing });
        }

        let proofs = {
            let cache = self.cache.lock().await;
            claimable
                .iter()
                .map(|n| cache.proof(ProofKind::Constraints, n))
                .collect::<Result<Vec<_>>>()?
        };

        let _guards = claimable
            .iter()
            .map(|n| self.inflight.begin(n.hash()))
            .collect::<Result<Vec<_>>>()?;
        info!(names = claimable.len(), "claiming names");
        let receipt = match self.client.submit_claim(&claimable, &proofs).await {
            Ok(receipt) => receipt,
            Err(e) => {
                let err = classify(e, self.config.user_rejected_code);
                self.events.emit(OrchestratorEvent::Failed { message: err.to_string(), retryable: err.is_retryable() });
                return Err(err);
            }
        };

        let mut results = self.results.lock().await;
        for name in &claimable {
            if let Some(AuctionResult::HasWinner { winner, auction_price, is_winner }) = results.get(name).cloned() {
                results.insert(
                    name.clone(),
                    AuctionResult::IsClaimed { owner: account.clone(), winner, auction_price, is_winner },
                );
            }
        }
        self.events.emit(OrchestratorEvent::Claimed { names: claimable.clone() });
        Ok(ClaimOutcome::Claimed { names: claimable, receipt })
    }

    /// Claim every name the account won
    pub async fn claim_all(&self, abort: &AbortHandle) -> Result<ClaimOutcome> {
        let names: Vec<Name> = self.results.lock().await.keys().cloned().collect();
        self.claim(&names, abort).await
    }

    /// Claim the won names of a revealed batch and advance its workflow
    pub async fn claim_bundle(&self, wf: &mut Workflow, abort: &AbortHandle) -> Result<ClaimOutcome> {
        expect_state(wf, matches!(wf.state, WorkflowState::Revealed { .. }), "claim")?;
        match self.claim(&wf.names(), abort).await {
            Ok(outcome @ ClaimOutcome::Claimed { .. }) => {
                advance(wf, Action::Claimed, &self.events)?;
                Ok(outcome)
            }
            Ok(outcome) => Ok(outcome),
            Err(e @ (SdkError::UserRejected | SdkError::TransactionFailed(_))) => {
                let action = match e {
                    SdkError::UserRejected => Action::UserRejected,
                    _ => Action::Failed { cause: e.to_string() },
                };
                advance(wf, action, &self.events)?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    // ============ WAVAX ============

    pub async fn wavax_status(&self) -> Result<WavaxStatus> {
        let balance = self.client.wavax_balance().await.map_err(SdkError::Client)?;
        let allowance = self.client.wavax_allowance().await.map_err(SdkError::Client)?;
        let revealed = self.client.revealed_bids().await.map_err(SdkError::Client)?;
        let rate = self.client.conversion_rate().await.map_err(SdkError::Client)?;
        let known = self.known_names().await?;

        let mut bid_total: u128 = 0;
        let mut fees: u128 = 0;
        for bid in &revealed {
            bid_total = bid_total.checked_add(bid.amount).ok_or(SdkError::Overflow("revealed bid total"))?;
            let Some(name) = bid.name.as_ref().or_else(|| known.get(&bid.name_hash)) else {
                debug!(hash = %bid.name_hash.short(), "no registration fee for unknown name");
                continue;
            };
            let fee = name_price_usd_cents(name)
                .checked_mul(rate)
                .ok_or(SdkError::Overflow("registration fee"))?;
            fees = fees.checked_add(fee).ok_or(SdkError::Overflow("registration fees"))?;
        }
        WavaxStatus::new(balance, allowance, bid_total, fees)
    }

    pub async fn wrap_avax(&self, amount: u128) -> Result<TxReceipt> {
        info!(amount, "wrapping AVAX");
        self.client
            .wrap_avax(amount)
            .await
            .map_err(|e| classify(e, self.config.user_rejected_code))
    }

    pub async fn approve_wavax(&self, amount: u128) -> Result<TxReceipt> {
        info!(amount, "approving WAVAX for the auction");
        self.client
            .approve_wavax(amount)
            .await
            .map_err(|e| classify(e, self.config.user_rejected_code))
    }

    /// Approve bids plus fees if the current allowance falls short
    pub async fn ensure_allowance(&self) -> Result<Option<TxReceipt>> {
        let status = self.wavax_status().await?;
        if status.approval_shortfall() == 0 {
            return Ok(None);
        }
        self.approve_wavax(status.required).await.map(Some)
    }
}
