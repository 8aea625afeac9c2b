// ============ Orchestrator Events ============
// Typed progress and lifecycle notifications.
//
// Orchestrators push events into an unbounded channel; a UI (or a test)
// drains the receiver. Dropping the receiver silently disables delivery.

use avvy_types::{BundleKind, Hash32, Name, ProofKind};
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    pub message: String,
}

impl ProofProgress {
    pub fn new(completed: usize, total: usize, message: impl Into<String>) -> Self {
        let percent = if total == 0 { 100 } else { (completed * 100 / total) as u8 };
        Self { completed, total, percent, message: message.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrchestratorEvent {
    ProofProgress(ProofProgress),
    ProofGenerated { kind: ProofKind, name: Name },
    StateChanged { kind: BundleKind, from: String, to: String },
    BundleCommitted { key: Hash32, kind: BundleKind },
    BundleRevealed { key: Hash32, kind: BundleKind },
    ClaimDeferred { missing: Vec<Name> },
    Claimed { names: Vec<Name> },
    ResultsLoaded { count: usize },
    Failed { message: String, retryable: bool },
}

#[derive(Clone, Debug, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
}

impl EventSink {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: OrchestratorEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening
            let _ = tx.send(event);
        }
    }
}

/// Drain everything currently queued
pub fn drain(rx: &mut mpsc::UnboundedReceiver<OrchestratorEvent>) -> Vec<OrchestratorEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
