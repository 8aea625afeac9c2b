// ============ Error Taxonomy ============

use avvy_commitment::CommitmentError;
use avvy_phase::{AuctionPhase, PhaseError};
use avvy_types::{BundleState, Hash32, Name, ProofKind, ValidationError};

use crate::store::StoreError;

/// Failure reported by the contract client or wallet
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code {code:?})")]
pub struct ClientError {
    /// Wallet / JSON-RPC error code when the collaborator supplied one
    pub code: Option<i64>,
    pub message: String,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into() }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self { code: Some(code), message: message.into() }
    }
}

/// Failure reported by the proving service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("prover error: {0}")]
pub struct ProverError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Invalid name or input; never reaches the transaction logic
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Generated proof did not verify; nothing was cached
    #[error("{kind} proof for {name} failed verification")]
    ProofVerificationFailed { kind: ProofKind, name: Name },

    #[error("{kind} proof for {name} could not be generated: {source}")]
    Prover {
        kind: ProofKind,
        name: Name,
        #[source]
        source: ProverError,
    },

    #[error("{kind} proof for {name} is not cached")]
    MissingProof { kind: ProofKind, name: Name },

    #[error("proof generation aborted")]
    Aborted,

    /// Wallet prompt declined; prior state is kept
    #[error("user rejected the wallet request")]
    UserRejected,

    /// Recorded bundle inputs no longer hash to its key
    #[error("bundle {expected} does not open: inputs hash to {actual}")]
    CommitmentMismatch { expected: Hash32, actual: Hash32 },

    #[error("transaction failed: {0}")]
    TransactionFailed(#[source] ClientError),

    #[error("action requires the {expected} phase (current: {actual:?})")]
    WrongPhase {
        expected: AuctionPhase,
        actual: Option<AuctionPhase>,
    },

    #[error("submission for {0} already in flight")]
    SubmissionInFlight(Hash32),

    #[error("bundle {0} not found")]
    BundleNotFound(Hash32),

    #[error("bundle {key} is {actual:?}, expected {expected:?}")]
    BundleState {
        key: Hash32,
        expected: BundleState,
        actual: BundleState,
    },

    #[error("workflow is {state}, cannot {action}")]
    InvalidTransition { state: String, action: String },

    #[error("nothing to submit")]
    EmptyBatch,

    #[error("session is not connected")]
    NotConnected,

    #[error("wrong chain: expected {expected}, wallet is on {actual}")]
    WrongChain { expected: u64, actual: u64 },

    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error(transparent)]
    Commitment(#[from] CommitmentError),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not read chain state: {0}")]
    Client(#[source] ClientError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bulk import rejected: {0}")]
    Import(String),
}

impl SdkError {
    /// Whether the same action may be retried as-is by the user
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SdkError::ProofVerificationFailed { .. }
                | SdkError::Prover { .. }
                | SdkError::Aborted
                | SdkError::UserRejected
                | SdkError::TransactionFailed(_)
                | SdkError::SubmissionInFlight(_)
                | SdkError::Client(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
