// ============ Submission Guards ============
// At most one submission per bundle key may be outstanding; a second
// attempt fails fast instead of racing the first. Failures are classified
// once here so every orchestrator treats a declined wallet prompt the same
// way. Nothing here retries.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use avvy_types::Hash32;
use tracing::{error, warn};

use crate::error::{ClientError, Result, SdkError};

#[derive(Clone, Debug, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<Hash32>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` until the returned guard is dropped
    pub fn begin(&self, key: Hash32) -> Result<InFlightGuard> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key) {
            warn!(key = %key.short(), "duplicate submission rejected");
            return Err(SdkError::SubmissionInFlight(key));
        }
        Ok(InFlightGuard { keys: Arc::clone(&self.keys), key })
    }

    pub fn contains(&self, key: &Hash32) -> bool {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).contains(key)
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<Hash32>>>,
    key: Hash32,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Map a failed transaction to `UserRejected` or `TransactionFailed`
pub fn classify(err: ClientError, user_rejected_code: i64) -> SdkError {
    if err.code == Some(user_rejected_code) {
        warn!(message = %err.message, "user rejected transaction");
        SdkError::UserRejected
    } else {
        error!(code = ?err.code, message = %err.message, "transaction failed");
        SdkError::TransactionFailed(err)
    }
}
