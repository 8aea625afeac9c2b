// ============ Test Doubles ============
// In-memory doubles for the contract client and the prover.
//
// `FakeChain` checks commitments the way the contracts do: a reveal or a
// registration only succeeds if its items and salt hash to a recorded
// commitment. Failures and latency can be injected per call.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use avvy_commitment::{bid_commitment, registration_commitment};
use avvy_types::{Hash32, Item, Name, Proof, ProofPair, Salt, TxReceipt};
use sha2::{Digest, Sha256};

use crate::client::{ContractClient, Preimage, ProofResult, ProofService, RevealedBid, WinningBid};
use crate::error::{ClientError, ProverError};
use crate::proofs::AbortHandle;

pub use crate::phase_clock::ManualTime;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============ Prover ============

#[derive(Default)]
pub struct FakeProver {
    prove_calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    abort_after: Mutex<Option<(usize, AbortHandle)>>,
}

impl FakeProver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prove_calls(&self) -> usize {
        self.prove_calls.load(Ordering::SeqCst)
    }

    /// Proofs for `name` will fail verification until cleared
    pub fn fail_verification_for(&self, name: &Name) {
        lock(&self.failing).insert(name.hash().to_hex());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    /// Trip `handle` once `calls` proofs have been produced
    pub fn abort_after(&self, calls: usize, handle: AbortHandle) {
        *lock(&self.abort_after) = Some((calls, handle));
    }
}

#[async_trait]
impl ProofService for FakeProver {
    async fn prove(&self, circuit: &str, inputs: &serde_json::Value) -> Result<ProofResult, ProverError> {
        let hash = inputs["hash"]
            .as_str()
            .ok_or_else(|| ProverError("inputs carry no hash".into()))?
            .to_string();
        let calls = self.prove_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, handle)) = &*lock(&self.abort_after) {
            if calls >= *after {
                handle.abort();
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(circuit.as_bytes());
        hasher.update(hash.as_bytes());
        Ok(ProofResult {
            circuit: circuit.to_string(),
            public_signals: vec![hash],
            proof: hasher.finalize().to_vec(),
        })
    }

    async fn verify(&self, _circuit: &str, result: &ProofResult) -> Result<bool, ProverError> {
        let failing = lock(&self.failing);
        Ok(!result.public_signals.iter().any(|s| failing.contains(s)))
    }

    async fn calldata(&self, result: &ProofResult) -> Result<Proof, ProverError> {
        Ok(Proof(result.proof.clone()))
    }
}

// ============ Chain ============

#[derive(Debug, Default)]
struct ChainState {
    boundaries: [u64; 4],
    boundary_fetches: usize,
    block: u64,
    bid_commits: HashSet<Hash32>,
    registration_commits: HashSet<Hash32>,
    revealed: Vec<RevealedBid>,
    winners: HashMap<Name, WinningBid>,
    registered: Vec<Name>,
    fail_next: Option<ClientError>,
    delay: Option<Duration>,
    tx_attempts: usize,
    reveal_calls: usize,
    preimage_reveals: usize,
    claim_calls: usize,
    registration_calls: usize,
    last_registration_value: Option<u128>,
    last_preimages: Option<Vec<Preimage>>,
    wavax_balance: u128,
    wavax_allowance: u128,
    conversion_rate: u128,
    registration_premium: u128,
}

pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new(boundaries: [u64; 4]) -> Self {
        Self {
            state: Mutex::new(ChainState { boundaries, conversion_rate: 1, ..Default::default() }),
        }
    }

    pub fn set_boundaries(&self, boundaries: [u64; 4]) {
        lock(&self.state).boundaries = boundaries;
    }

    pub fn boundary_fetches(&self) -> usize {
        lock(&self.state).boundary_fetches
    }

    /// The next transaction fails with `err`
    pub fn fail_next(&self, err: ClientError) {
        lock(&self.state).fail_next = Some(err);
    }

    /// The next transaction is declined in the wallet
    pub fn reject_next(&self) {
        self.fail_next(ClientError::with_code(avvy_types::USER_REJECTED_CODE, "User denied transaction signature"));
    }

    /// Every transaction waits this long before landing
    pub fn set_delay(&self, delay: Duration) {
        lock(&self.state).delay = Some(delay);
    }

    pub fn set_winner(&self, name: &Name, winner: &str, auction_price: u128) {
        lock(&self.state).winners.insert(
            name.clone(),
            WinningBid { winner: winner.to_string(), auction_price, owner: None },
        );
    }

    pub fn set_wavax(&self, balance: u128, allowance: u128) {
        let mut state = lock(&self.state);
        state.wavax_balance = balance;
        state.wavax_allowance = allowance;
    }

    pub fn set_pricing(&self, conversion_rate: u128, registration_premium: u128) {
        let mut state = lock(&self.state);
        state.conversion_rate = conversion_rate;
        state.registration_premium = registration_premium;
    }

    pub fn bid_commit_count(&self) -> usize {
        lock(&self.state).bid_commits.len()
    }

    pub fn registration_commit_count(&self) -> usize {
        lock(&self.state).registration_commits.len()
    }

    /// Every transaction sent, including failed ones
    pub fn tx_attempts(&self) -> usize {
        lock(&self.state).tx_attempts
    }

    pub fn reveal_calls(&self) -> usize {
        lock(&self.state).reveal_calls
    }

    pub fn preimage_reveals(&self) -> usize {
        lock(&self.state).preimage_reveals
    }

    pub fn claim_calls(&self) -> usize {
        lock(&self.state).claim_calls
    }

    pub fn registration_calls(&self) -> usize {
        lock(&self.state).registration_calls
    }

    pub fn revealed(&self) -> Vec<RevealedBid> {
        lock(&self.state).revealed.clone()
    }

    pub fn registered(&self) -> Vec<Name> {
        lock(&self.state).registered.clone()
    }

    pub fn last_registration_value(&self) -> Option<u128> {
        lock(&self.state).last_registration_value
    }

    pub fn last_preimages(&self) -> Option<Vec<Preimage>> {
        lock(&self.state).last_preimages.clone()
    }

    pub fn wavax_allowance_now(&self) -> u128 {
        lock(&self.state).wavax_allowance
    }

    /// Common transaction preamble: latency, injected failure, next block
    async fn begin_tx(&self) -> Result<u64, ClientError> {
        let delay = lock(&self.state).delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = lock(&self.state);
        state.tx_attempts += 1;
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        state.block += 1;
        Ok(state.block)
    }

    fn receipt(block: u64) -> TxReceipt {
        let mut tx_hash = [0u8; 32];
        tx_hash[24..].copy_from_slice(&block.to_be_bytes());
        TxReceipt { tx_hash: Hash32(tx_hash), block_number: block }
    }

    fn reveal_items(&self, items: &[Item], salt: &Salt, with_names: bool) -> Result<(), ClientError> {
        let key = bid_commitment(items, salt).map_err(|e| ClientError::new(e.to_string()))?;
        let mut state = lock(&self.state);
        if !state.bid_commits.contains(&key) {
            return Err(ClientError::new("execution reverted: unknown commitment"));
        }
        let timestamp = state.block;
        for item in items {
            state.revealed.push(RevealedBid {
                name_hash: item.name.hash(),
                amount: item.value.as_u128(),
                timestamp,
                name: with_names.then(|| item.name.clone()),
            });
        }
        state.reveal_calls += 1;
        Ok(())
    }
}

#[async_trait]
impl ContractClient for FakeChain {
    async fn auction_phase_boundaries(&self) -> Result<[u64; 4], ClientError> {
        let mut state = lock(&self.state);
        state.boundary_fetches += 1;
        Ok(state.boundaries)
    }

    async fn submit_bid_commit(&self, hash: &Hash32) -> Result<TxReceipt, ClientError> {
        let block = self.begin_tx().await?;
        lock(&self.state).bid_commits.insert(*hash);
        Ok(Self::receipt(block))
    }

    async fn submit_reveal(&self, items: &[Item], salt: &Salt) -> Result<TxReceipt, ClientError> {
        let block = self.begin_tx().await?;
        self.reveal_items(items, salt, false)?;
        Ok(Self::receipt(block))
    }

    async fn submit_reveal_with_preimage(
        &self,
        items: &[Item],
        salt: &Salt,
        preimages: &[Preimage],
    ) -> Result<TxReceipt, ClientError> {
        let block = self.begin_tx().await?;
        if preimages.len() != items.len() {
            return Err(ClientError::new("execution reverted: preimage count"));
        }
        self.reveal_items(items, salt, true)?;
        let mut state = lock(&self.state);
        state.preimage_reveals += 1;
        state.last_preimages = Some(preimages.to_vec());
        Ok(Self::receipt(block))
    }

    async fn submit_claim(&self, names: &[Name], proofs: &[Proof]) -> Result<TxReceipt, ClientError> {
        let block = self.begin_tx().await?;
        if names.len() != proofs.len() {
            return Err(ClientError::new("execution reverted: proof count"));
        }
        let mut state = lock(&self.state);
        for name in names {
            let winner = state
                .winners
                .get_mut(name)
                .ok_or_else(|| ClientError::new(format!("execution reverted: no auction for {name}")))?;
            if winner.owner.is_some() {
                return Err(ClientError::new(format!("execution reverted: {name} already claimed")));
            }
            winner.owner = Some(winner.winner.clone());
        }
        state.claim_calls += 1;
        Ok(Self::receipt(block))
    }

    async fn revealed_bids(&self) -> Result<Vec<RevealedBid>, ClientError> {
        Ok(lock(&self.state).revealed.clone())
    }

    async fn winning_bid(&self, name: &Name) -> Result<Option<WinningBid>, ClientError> {
        Ok(lock(&self.state).winners.get(name).cloned())
    }

    async fn submit_registration_commit(&self, hash: &Hash32) -> Result<TxReceipt, ClientError> {
        let block = self.begin_tx().await?;
        lock(&self.state).registration_commits.insert(*hash);
        Ok(Self::receipt(block))
    }

    async fn submit_registration(
        &self,
        items: &[Item],
        proofs: &[ProofPair],
        salt: &Salt,
        value: u128,
        preimages: Option<&[Preimage]>,
    ) -> Result<TxReceipt, ClientError> {
        let block = self.begin_tx().await?;
        let key = registration_commitment(items, proofs, salt).map_err(|e| ClientError::new(e.to_string()))?;
        let mut state = lock(&self.state);
        if !state.registration_commits.contains(&key) {
            return Err(ClientError::new("execution reverted: unknown commitment"));
        }
        state.registered.extend(items.iter().map(|i| i.name.clone()));
        state.registration_calls += 1;
        state.last_registration_value = Some(value);
        state.last_preimages = preimages.map(<[Preimage]>::to_vec);
        Ok(Self::receipt(block))
    }

    async fn registration_premium(&self) -> Result<u128, ClientError> {
        Ok(lock(&self.state).registration_premium)
    }

    async fn conversion_rate(&self) -> Result<u128, ClientError> {
        Ok(lock(&self.state).conversion_rate)
    }

    async fn wavax_balance(&self) -> Result<u128, ClientError> {
        Ok(lock(&self.state).wavax_balance)
    }

    async fn wavax_allowance(&self) -> Result<u128, ClientError> {
        Ok(lock(&self.state).wavax_allowance)
    }

    async fn wrap_avax(&self, amount: u128) -> Result<TxReceipt, ClientError> {
        let block = self.begin_tx().await?;
        let mut state = lock(&self.state);
        state.wavax_balance = state.wavax_balance.saturating_add(amount);
        Ok(Self::receipt(block))
    }

    async fn approve_wavax(&self, amount: u128) -> Result<TxReceipt, ClientError> {
        let block = self.begin_tx().await?;
        lock(&self.state).wavax_allowance = amount;
        Ok(Self::receipt(block))
    }
}
