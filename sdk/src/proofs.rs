// ============ Proof Generation ============
// Proof generation and memoization.
//
// Proofs are expensive (seconds each) and deterministic for a given
// (kind, name), so every generated proof is kept in a shared memo table and
// never requested twice. A proof that fails verification is never cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use avvy_types::{Name, Proof, ProofKind, ProofPair, MAX_LABEL_LEN, NAMESPACE};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::ProofService;
use crate::error::{Result, SdkError};
use crate::events::{EventSink, OrchestratorEvent, ProofProgress};

/// Constraint on the minimum length the pricing circuit checks against
const PRICING_LENGTH_CAP: usize = 6;

// ============ Memo Table ============

#[derive(Debug, Default)]
pub struct ProofCache {
    proofs: HashMap<(ProofKind, Name), Proof>,
}

pub type SharedProofCache = Arc<Mutex<ProofCache>>;

impl ProofCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedProofCache {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn get(&self, kind: ProofKind, name: &Name) -> Option<&Proof> {
        self.proofs.get(&(kind, name.clone()))
    }

    pub fn contains(&self, kind: ProofKind, name: &Name) -> bool {
        self.proofs.contains_key(&(kind, name.clone()))
    }

    pub fn insert(&mut self, kind: ProofKind, name: Name, proof: Proof) {
        self.proofs.insert((kind, name), proof);
    }

    /// Forget every proof held for `name`
    pub fn invalidate(&mut self, name: &Name) {
        self.proofs.retain(|(_, n), _| n != name);
    }

    pub fn len(&self) -> usize {
        self.proofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    /// Names (in input order) lacking a proof of `kind`
    pub fn missing(&self, kind: ProofKind, names: &[Name]) -> Vec<Name> {
        names.iter().filter(|n| !self.contains(kind, n)).cloned().collect()
    }

    pub fn proof(&self, kind: ProofKind, name: &Name) -> Result<Proof> {
        self.get(kind, name)
            .cloned()
            .ok_or_else(|| SdkError::MissingProof { kind, name: name.clone() })
    }

    /// One pricing + constraints pair per name, aligned with `names`
    pub fn pairs(&self, names: &[Name]) -> Result<Vec<ProofPair>> {
        names
            .iter()
            .map(|name| {
                Ok(ProofPair {
                    pricing: self.proof(ProofKind::Pricing, name)?,
                    constraints: self.proof(ProofKind::Constraints, name)?,
                })
            })
            .collect()
    }
}

// ============ Abort ============

/// Cooperative cancellation, checked between individual proofs
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============ Circuit Inputs ============

fn ascii_padded(s: &str, width: usize) -> Vec<u32> {
    let mut out: Vec<u32> = s.bytes().map(u32::from).collect();
    out.resize(width.max(out.len()), 0);
    out
}

/// Prover inputs for one (kind, name)
pub fn circuit_inputs(kind: ProofKind, name: &Name) -> serde_json::Value {
    let label = name.label();
    let hash = name.hash().to_hex();
    match kind {
        ProofKind::Pricing => json!({
            "namespaceId": NAMESPACE,
            "name": ascii_padded(label, MAX_LABEL_LEN),
            "hash": hash,
            "minLength": label.chars().count().min(PRICING_LENGTH_CAP),
        }),
        ProofKind::Constraints => json!({
            "namespace": ascii_padded(NAMESPACE, MAX_LABEL_LEN),
            "name": ascii_padded(label, MAX_LABEL_LEN),
            "hash": hash,
        }),
    }
}

// ============ Generator ============

pub struct ProofGenerator<P> {
    prover: Arc<P>,
}

impl<P> Clone for ProofGenerator<P> {
    fn clone(&self) -> Self {
        Self { prover: Arc::clone(&self.prover) }
    }
}

impl<P: ProofService> ProofGenerator<P> {
    pub fn new(prover: Arc<P>) -> Self {
        Self { prover }
    }

    pub fn prover(&self) -> &P {
        &self.prover
    }

    /// Prove, verify, and convert to calldata. Does not touch any cache.
    pub async fn generate(&self, kind: ProofKind, name: &Name) -> Result<Proof> {
        let circuit = kind.circuit();
        let inputs = circuit_inputs(kind, name);
        let prover_err = |source| SdkError::Prover { kind, name: name.clone(), source };

        let result = self.prover.prove(circuit, &inputs).await.map_err(prover_err)?;
        let valid = self.prover.verify(circuit, &result).await.map_err(prover_err)?;
        if !valid {
            warn!(%kind, %name, "proof failed verification");
            return Err(SdkError::ProofVerificationFailed { kind, name: name.clone() });
        }
        self.prover.calldata(&result).await.map_err(prover_err)
    }

    /// Make sure every (kind, name) pair is in the cache.
    ///
    /// Steps run one at a time in name order, kinds in the given order.
    /// Progress is emitted at 0 and after each step; cached steps count as
    /// completed. Safe to call again after a failure: it resumes from what
    /// is already cached.
    pub async fn ensure(
        &self,
        cache: &SharedProofCache,
        names: &[Name],
        kinds: &[ProofKind],
        events: &EventSink,
        abort: &AbortHandle,
    ) -> Result<()> {
        let total = names.len() * kinds.len();
        let mut completed = 0;
        events.emit(OrchestratorEvent::ProofProgress(ProofProgress::new(0, total, "starting")));

        for name in names {
            for &kind in kinds {
                if abort.is_aborted() {
                    info!(completed, total, "proof generation aborted");
                    return Err(SdkError::Aborted);
                }

                if cache.lock().await.contains(kind, name) {
                    debug!(%kind, %name, "proof cache hit");
                } else {
                    let proof = self.generate(kind, name).await?;
                    cache.lock().await.insert(kind, name.clone(), proof);
                    events.emit(OrchestratorEvent::ProofGenerated { kind, name: name.clone() });
                }

                completed += 1;
                events.emit(OrchestratorEvent::ProofProgress(ProofProgress::new(
                    completed,
                    total,
                    format!("{kind} proof for {name}"),
                )));
            }
        }

        info!(names = names.len(), total, "proofs ready");
        Ok(())
    }
}
