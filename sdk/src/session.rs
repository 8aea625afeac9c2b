// ============ Wallet Session ============
// Who is connected, on which chain.
//
// Passed explicitly to the orchestrators instead of living in globals.
// Observers subscribe for typed lifecycle events.

use std::sync::{Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::info;

use crate::error::{Result, SdkError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { account: String, chain_id: u64 },
    Disconnected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum SessionState {
    Disconnected,
    Connected { account: String, chain_id: u64 },
}

pub struct Session {
    expected_chain_id: u64,
    state: RwLock<SessionState>,
    observers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
}

impl Session {
    pub fn new(expected_chain_id: u64) -> Self {
        Self {
            expected_chain_id,
            state: RwLock::new(SessionState::Disconnected),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn connect(&self, account: &str, chain_id: u64) -> Result<()> {
        if chain_id != self.expected_chain_id {
            return Err(SdkError::WrongChain {
                expected: self.expected_chain_id,
                actual: chain_id,
            });
        }
        // Accounts compare case-insensitively on EVM chains
        let account = account.to_lowercase();
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = SessionState::Connected {
            account: account.clone(),
            chain_id,
        };
        info!(%account, chain_id, "wallet connected");
        self.notify(SessionEvent::Connected { account, chain_id });
        Ok(())
    }

    pub fn disconnect(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state == SessionState::Disconnected {
            return;
        }
        *state = SessionState::Disconnected;
        drop(state);
        info!("wallet disconnected");
        self.notify(SessionEvent::Disconnected);
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            *self.state.read().unwrap_or_else(PoisonError::into_inner),
            SessionState::Connected { .. }
        )
    }

    /// Lower-cased account address
    pub fn account(&self) -> Result<String> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            SessionState::Connected { account, .. } => Ok(account.clone()),
            SessionState::Disconnected => Err(SdkError::NotConnected),
        }
    }

    pub fn chain_id(&self) -> Option<u64> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            SessionState::Connected { chain_id, .. } => Some(*chain_id),
            SessionState::Disconnected => None,
        }
    }

    fn notify(&self, event: SessionEvent) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
