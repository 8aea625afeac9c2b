// ============ Direct Registration ============
// Commit to a batch of names with their pricing and constraints proofs,
// then finalize by paying for them.
//
// Each finalize handles at most `max_registration_names`; the outcome says
// whether the cart still holds more.

use std::sync::Arc;

use avvy_commitment::{batch_key, generate_salt, next_batch, registration_commitment};
use avvy_types::{Blocklist, Bundle, BundleKind, BundleState, Hash32, Item, Name, NoBlocklist, ProofKind, TxReceipt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cart::Cart;
use crate::client::{ContractClient, ProofService};
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::events::{EventSink, OrchestratorEvent};
use crate::flow::{advance, ensure_workflow_proofs, expect_state, invalid_action, persist_state, record_failure};
use crate::phase_clock::{SystemTimeSource, TimeSource};
use crate::pricing::registration_value;
use crate::proofs::{AbortHandle, ProofCache, ProofGenerator, SharedProofCache};
use crate::session::Session;
use crate::state::{Action, Workflow, WorkflowState};
use crate::store::BundleStore;
use crate::submit::{classify, InFlight};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub receipt: TxReceipt,
    pub names: Vec<Name>,
    /// The cart still holds names for another batch
    pub has_more: bool,
}

pub struct RegistrationOrchestrator<C, P, S> {
    config: SdkConfig,
    session: Arc<Session>,
    client: Arc<C>,
    proofs: ProofGenerator<P>,
    cache: SharedProofCache,
    store: Arc<S>,
    time: Arc<dyn TimeSource>,
    events: EventSink,
    inflight: InFlight,
    blocklist: Arc<dyn Blocklist + Send + Sync>,
    cart: Mutex<Cart>,
}

impl<C, P, S> RegistrationOrchestrator<C, P, S>
where
    C: ContractClient,
    P: ProofService,
    S: BundleStore,
{
    pub fn new(config: SdkConfig, session: Arc<Session>, client: Arc<C>, prover: Arc<P>, store: Arc<S>) -> Self {
        let cart = Cart::new(config.max_registration_quantity);
        Self {
            config,
            session,
            client,
            proofs: ProofGenerator::new(prover),
            cache: ProofCache::shared(),
            store,
            time: Arc::new(SystemTimeSource),
            events: EventSink::disabled(),
            inflight: InFlight::new(),
            blocklist: Arc::new(NoBlocklist),
            cart: Mutex::new(cart),
        }
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

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

    // ============ Cart ============

    pub async fn add_to_cart(&self, name: &str) -> Result<Name> {
        let name = Name::parse_with(&name.to_lowercase(), self.blocklist.as_ref())?;
        self.cart.lock().await.add(name.clone());
        Ok(name)
    }

    pub async fn remove_from_cart(&self, name: &Name) -> bool {
        self.cart.lock().await.remove(name)
    }

    pub async fn set_quantity(&self, name: &Name, years: u32) -> Result<()> {
        self.cart.lock().await.set_quantity(name.clone(), years)
    }

    pub async fn cart_items(&self) -> Vec<Item> {
        self.cart.lock().await.items()
    }

    /// Value the next finalize would send for `items`
    pub async fn estimate_value(&self, items: &[Item]) -> Result<u128> {
        let rate = self.client.conversion_rate().await.map_err(SdkError::Client)?;
        let premium = self.client.registration_premium().await.map_err(SdkError::Client)?;
        registration_value(items, rate, premium)
    }

    // ============ Workflow ============

    /// Next batch from the cart, in cart order
    pub async fn prepare(&self) -> Result<Workflow> {
        let items = self.cart.lock().await.items();
        if items.is_empty() {
            return Err(SdkError::EmptyBatch);
        }
        let (batch, has_more) = next_batch(&items, self.config.max_registration_names)?;
        debug!(batch = batch.len(), has_more, "registration batch prepared");
        Ok(Workflow::new(BundleKind::Registration, batch, has_more))
    }

    pub async fn ensure_proofs(&self, wf: &mut Workflow, abort: &AbortHandle) -> Result<()> {
        ensure_workflow_proofs(&self.proofs, &self.cache, wf, &ProofKind::ALL, &self.events, abort).await
    }

    pub async fn commit(&self, wf: &mut Workflow) -> Result<TxReceipt> {
        expect_state(wf, wf.state == WorkflowState::ProofsReady, "commit")?;
        if !self.session.is_connected() {
            return Err(SdkError::NotConnected);
        }

        // Same batch, any salt: one commit at a time
        let _batch_guard = self.inflight.begin(batch_key(BundleKind::Registration, &wf.items))?;

        let proofs = self.cache.lock().await.pairs(&wf.names())?;
        let salt = generate_salt();
        let key = registration_commitment(&wf.items, &proofs, &salt)?;
        self.store
            .insert(Bundle {
                key,
                kind: BundleKind::Registration,
                items: wf.items.clone(),
                proofs,
                salt,
                state: BundleState::Uncommitted,
                created_at: self.time.now(),
            })
            .await?;

        let _guard = self.inflight.begin(key)?;
        info!(key = %key.short(), names = wf.items.len(), "submitting registration commitment");
        let receipt = match self.client.submit_registration_commit(&key).await {
            Ok(receipt) => receipt,
            Err(e) => {
                let err = classify(e, self.config.user_rejected_code);
                return Err(record_failure(wf, err, &self.events));
            }
        };

        advance(wf, Action::Committed { key }, &self.events)?;
        self.events.emit(OrchestratorEvent::BundleCommitted { key, kind: BundleKind::Registration });
        persist_state(self.store.mark_committed(&key).await, &key)?;
        Ok(receipt)
    }

    /// Pay for and register the committed names, then drop them from the cart.
    /// Once the chain confirms, the workflow is `Finalized` even if recording
    /// that locally fails.
    pub async fn finalize(&self, wf: &mut Workflow) -> Result<FinalizeOutcome> {
        let WorkflowState::Committed { key } = wf.state else {
            return Err(invalid_action(wf, "finalize"));
        };
        let _guard = self.inflight.begin(key)?;

        let bundle = self.store.get(&key).await?.ok_or(SdkError::BundleNotFound(key))?;
        // An uncommitted record may still be on-chain; the contract decides
        if bundle.state == BundleState::Revealed {
            return Err(SdkError::BundleState { key, expected: BundleState::Committed, actual: bundle.state });
        }
        let actual = registration_commitment(&bundle.items, &bundle.proofs, &bundle.salt)?;
        if actual != key {
            let err = SdkError::CommitmentMismatch { expected: key, actual };
            return Err(record_failure(wf, err, &self.events));
        }

        let names = bundle.names();
        let submitted = match self.finalize_args(&bundle).await {
            Ok((value, preimages)) => {
                info!(key = %key.short(), names = names.len(), value, "finalizing registration");
                self.client
                    .submit_registration(&bundle.items, &bundle.proofs, &bundle.salt, value, preimages.as_deref())
                    .await
                    .map_err(|e| classify(e, self.config.user_rejected_code))
            }
            Err(e) => Err(e),
        };
        let receipt = match submitted {
            Ok(receipt) => receipt,
            Err(e) => return Err(record_failure(wf, e, &self.events)),
        };

        advance(wf, Action::Finalized, &self.events)?;
        self.cart.lock().await.clear(&names);
        self.events.emit(OrchestratorEvent::BundleRevealed { key, kind: BundleKind::Registration });
        persist_state(self.store.mark_revealed(&key).await, &key)?;
        Ok(FinalizeOutcome { receipt, names, has_more: wf.has_more })
    }

    async fn finalize_args(&self, bundle: &Bundle) -> Result<(u128, Option<Vec<Vec<u8>>>)> {
        let value = self.estimate_value(&bundle.items).await?;
        let preimages = if self.config.enhanced_privacy {
            None
        } else {
            Some(
                self.client
                    .build_preimages(&bundle.names())
                    .await
                    .map_err(SdkError::Client)?,
            )
        };
        Ok((value, preimages))
    }

    /// Finalize a stored bundle by key, e.g. after a restart
    pub async fn finalize_bundle(&self, key: &Hash32) -> Result<(Workflow, FinalizeOutcome)> {
        let bundle = self.store.get(key).await?.ok_or(SdkError::BundleNotFound(*key))?;
        if bundle.kind != BundleKind::Registration {
            return Err(SdkError::BundleNotFound(*key));
        }
        let mut wf = Workflow::resume_onchain(&bundle);
        let batch = bundle.names();
        wf.has_more = self.cart.lock().await.names().iter().any(|n| !batch.contains(n));
        let outcome = self.finalize(&mut wf).await?;
        Ok((wf, outcome))
    }
}
