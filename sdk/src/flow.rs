// ============ Shared Workflow Steps ============
// Used by the auction and registration orchestrators: applying transitions
// with notification, recording failures, persisting confirmed state and the
// proof-ensure step.

use avvy_types::{Bundle, Hash32, ProofKind};
use tracing::{debug, error, info};

use crate::client::ProofService;
use crate::error::{Result, SdkError};
use crate::events::{EventSink, OrchestratorEvent};
use crate::proofs::{AbortHandle, ProofGenerator, SharedProofCache};
use crate::state::{Action, Recovery, Workflow, WorkflowState};
use crate::store::StoreError;

pub(crate) fn advance(wf: &mut Workflow, action: Action, events: &EventSink) -> Result<()> {
    let from = wf.apply(&action)?;
    if from != wf.state {
        info!(kind = ?wf.kind, from = from.label(), to = wf.state.label(), "workflow transition");
        events.emit(OrchestratorEvent::StateChanged {
            kind: wf.kind,
            from: from.label().to_string(),
            to: wf.state.label().to_string(),
        });
    }
    Ok(())
}

/// Record a state the chain already confirmed. The workflow has moved on
/// regardless; a failure here only means the local copy lags behind.
pub(crate) fn persist_state(result: std::result::Result<Bundle, StoreError>, key: &Hash32) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            error!(key = %key.short(), error = %e, "confirmed on-chain but not recorded locally");
            Err(e.into())
        }
    }
}

/// Move the workflow to match `err` and hand the error back.
/// A declined wallet prompt leaves the state untouched.
pub(crate) fn record_failure(wf: &mut Workflow, err: SdkError, events: &EventSink) -> SdkError {
    let cause = err.to_string();
    let action = match &err {
        SdkError::UserRejected => Action::UserRejected,
        SdkError::CommitmentMismatch { .. } => Action::Mismatch { cause: cause.clone() },
        SdkError::ProofVerificationFailed { .. } | SdkError::Prover { .. } | SdkError::MissingProof { .. } => {
            Action::ProofFailed { cause: cause.clone() }
        }
        _ => Action::Failed { cause: cause.clone() },
    };
    events.emit(OrchestratorEvent::Failed { message: cause, retryable: err.is_retryable() });
    if let Err(e) = advance(wf, action, events) {
        debug!(error = %e, "failure left workflow state unchanged");
    }
    err
}

pub(crate) fn invalid_action(wf: &Workflow, action: &str) -> SdkError {
    SdkError::InvalidTransition {
        state: wf.state.label().to_string(),
        action: action.to_string(),
    }
}

pub(crate) fn expect_state(wf: &Workflow, ok: bool, action: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(invalid_action(wf, action))
    }
}

/// Generate whatever proofs `wf` still lacks and mark it ready.
/// Re-entering after a proof failure resumes from the cache.
pub(crate) async fn ensure_workflow_proofs<P: ProofService>(
    generator: &ProofGenerator<P>,
    cache: &SharedProofCache,
    wf: &mut Workflow,
    kinds: &[ProofKind],
    events: &EventSink,
    abort: &AbortHandle,
) -> Result<()> {
    if matches!(wf.state, WorkflowState::Error { recovery: Recovery::RetryProofs, .. }) {
        advance(wf, Action::Retry, events)?;
    }
    expect_state(
        wf,
        matches!(wf.state, WorkflowState::AwaitingProofs | WorkflowState::ProofsReady),
        "generate proofs",
    )?;

    match generator.ensure(cache, &wf.names(), kinds, events, abort).await {
        Ok(()) => advance(wf, Action::ProofsReady, events),
        Err(SdkError::Aborted) => Err(SdkError::Aborted),
        Err(e) => Err(record_failure(wf, e, events)),
    }
}
