// ============ Workflow State Machine ============
// Auction:      AwaitingProofs -> ProofsReady -> Committed -> Revealed -> Claimed
// Registration: AwaitingProofs -> ProofsReady -> Committed -> Finalized
//
// Any step may land in `Error`, which records how to recover. Transitions
// are computed by `transition`, a pure function; the orchestrators only
// perform the side effects.

use avvy_types::{Bundle, BundleKind, BundleState, Hash32, Item, Name};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recovery {
    RetryProofs,
    RetryCommit,
    RetryReveal { key: Hash32 },
    RetryFinalize { key: Hash32 },
    RetryClaim { key: Hash32 },
    /// Recorded inputs no longer open the commitment; needs a human
    InspectBundle { key: Hash32 },
}

impl Recovery {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Recovery::InspectBundle { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    AwaitingProofs,
    ProofsReady,
    Committed { key: Hash32 },
    Revealed { key: Hash32 },
    Claimed { key: Hash32 },
    Finalized { key: Hash32 },
    Error { cause: String, recovery: Recovery },
}

impl WorkflowState {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowState::AwaitingProofs => "awaiting-proofs",
            WorkflowState::ProofsReady => "proofs-ready",
            WorkflowState::Committed { .. } => "committed",
            WorkflowState::Revealed { .. } => "revealed",
            WorkflowState::Claimed { .. } => "claimed",
            WorkflowState::Finalized { .. } => "finalized",
            WorkflowState::Error { .. } => "error",
        }
    }

    pub fn key(&self) -> Option<Hash32> {
        match self {
            WorkflowState::Committed { key }
            | WorkflowState::Revealed { key }
            | WorkflowState::Claimed { key }
            | WorkflowState::Finalized { key } => Some(*key),
            WorkflowState::Error { recovery, .. } => match recovery {
                Recovery::RetryReveal { key }
                | Recovery::RetryFinalize { key }
                | Recovery::RetryClaim { key }
                | Recovery::InspectBundle { key } => Some(*key),
                Recovery::RetryProofs | Recovery::RetryCommit => None,
            },
            WorkflowState::AwaitingProofs | WorkflowState::ProofsReady => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Claimed { .. } | WorkflowState::Finalized { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    ProofsReady,
    ProofFailed { cause: String },
    Committed { key: Hash32 },
    /// Wallet prompt declined; the state does not change
    UserRejected,
    Revealed,
    Finalized,
    Claimed,
    /// Transaction or chain failure; retryable
    Failed { cause: String },
    /// Recomputed commitment does not match the recorded key
    Mismatch { cause: String },
    Retry,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::ProofsReady => "proofs-ready",
            Action::ProofFailed { .. } => "proof-failed",
            Action::Committed { .. } => "commit",
            Action::UserRejected => "user-rejected",
            Action::Revealed => "reveal",
            Action::Finalized => "finalize",
            Action::Claimed => "claim",
            Action::Failed { .. } => "fail",
            Action::Mismatch { .. } => "mismatch",
            Action::Retry => "retry",
        }
    }
}

fn error(cause: &str, recovery: Recovery) -> WorkflowState {
    WorkflowState::Error { cause: cause.to_string(), recovery }
}

/// Next state for `action`, or `InvalidTransition` if it does not apply
pub fn transition(kind: BundleKind, state: &WorkflowState, action: &Action) -> Result<WorkflowState> {
    use BundleKind::{Auction, Registration};
    use WorkflowState as S;

    let next = match (state, action) {
        (S::AwaitingProofs, Action::ProofsReady) => S::ProofsReady,
        // Proofs can be re-ensured at any point before commit
        (S::ProofsReady, Action::ProofsReady) => S::ProofsReady,
        (S::AwaitingProofs | S::ProofsReady, Action::ProofFailed { cause }) => {
            error(cause, Recovery::RetryProofs)
        }

        (S::ProofsReady, Action::Committed { key }) => S::Committed { key: *key },
        (S::ProofsReady, Action::Failed { cause }) => error(cause, Recovery::RetryCommit),

        (S::Committed { key }, Action::Revealed) if kind == Auction => S::Revealed { key: *key },
        (S::Committed { key }, Action::Finalized) if kind == Registration => {
            S::Finalized { key: *key }
        }
        (S::Committed { key }, Action::Failed { cause }) => match kind {
            Auction => error(cause, Recovery::RetryReveal { key: *key }),
            Registration => error(cause, Recovery::RetryFinalize { key: *key }),
        },
        (S::Committed { key }, Action::Mismatch { cause }) => {
            error(cause, Recovery::InspectBundle { key: *key })
        }

        (S::Revealed { key }, Action::Claimed) if kind == Auction => S::Claimed { key: *key },
        (S::Revealed { key }, Action::Failed { cause }) => {
            error(cause, Recovery::RetryClaim { key: *key })
        }

        (S::ProofsReady | S::Committed { .. } | S::Revealed { .. }, Action::UserRejected) => {
            state.clone()
        }

        (S::Error { recovery, .. }, Action::Retry) => match recovery {
            Recovery::RetryProofs => S::AwaitingProofs,
            Recovery::RetryCommit => S::ProofsReady,
            Recovery::RetryReveal { key } | Recovery::RetryFinalize { key } => {
                S::Committed { key: *key }
            }
            Recovery::RetryClaim { key } => S::Revealed { key: *key },
            Recovery::InspectBundle { .. } => return Err(invalid(state, action)),
        },

        _ => return Err(invalid(state, action)),
    };
    Ok(next)
}

fn invalid(state: &WorkflowState, action: &Action) -> SdkError {
    SdkError::InvalidTransition {
        state: state.label().to_string(),
        action: action.label().to_string(),
    }
}

// ============ Workflow ============

/// One batch moving through the commit-reveal lifecycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workflow {
    pub kind: BundleKind,
    pub items: Vec<Item>,
    pub state: WorkflowState,
    /// More items are waiting for a later batch
    pub has_more: bool,
}

impl Workflow {
    pub fn new(kind: BundleKind, items: Vec<Item>, has_more: bool) -> Self {
        Self { kind, items, state: WorkflowState::AwaitingProofs, has_more }
    }

    /// Pick up a persisted bundle, e.g. after a restart.
    /// An uncommitted bundle never reached the chain, so it resumes before commit.
    pub fn resume(bundle: &Bundle) -> Self {
        let key = bundle.key;
        let state = match (bundle.state, bundle.kind) {
            (BundleState::Uncommitted, _) => WorkflowState::ProofsReady,
            (BundleState::Committed, _) => WorkflowState::Committed { key },
            (BundleState::Revealed, BundleKind::Auction) => WorkflowState::Revealed { key },
            (BundleState::Revealed, BundleKind::Registration) => WorkflowState::Finalized { key },
        };
        Self { kind: bundle.kind, items: bundle.items.clone(), state, has_more: false }
    }

    /// Resume for a reveal or finalize requested by key. An uncommitted
    /// record may still have landed on-chain without being recorded, so it
    /// resumes as committed and the contract decides.
    pub fn resume_onchain(bundle: &Bundle) -> Self {
        let mut wf = Self::resume(bundle);
        if bundle.state == BundleState::Uncommitted {
            wf.state = WorkflowState::Committed { key: bundle.key };
        }
        wf
    }

    /// Apply `action`, returning the previous state
    pub fn apply(&mut self, action: &Action) -> Result<WorkflowState> {
        let next = transition(self.kind, &self.state, action)?;
        Ok(std::mem::replace(&mut self.state, next))
    }

    pub fn retry(&mut self) -> Result<WorkflowState> {
        self.apply(&Action::Retry)
    }

    pub fn key(&self) -> Option<Hash32> {
        self.state.key()
    }

    pub fn names(&self) -> Vec<Name> {
        self.items.iter().map(|i| i.name.clone()).collect()
    }
}
