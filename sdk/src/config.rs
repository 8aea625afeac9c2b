// ============ Orchestrator Configuration ============

use std::path::{Path, PathBuf};

use avvy_types::{
    MAX_BID_BATCH, MAX_REGISTRATION_NAMES, MAX_REGISTRATION_QUANTITY, PHASE_CACHE_TTL_SECS,
    USER_REJECTED_CODE,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

/// Tunables shared by the auction and registration orchestrators.
///
/// Every field has a default, so a config file only needs the values it
/// overrides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Chain the wallet must be connected to
    pub chain_id: u64,
    /// Names finalized per registration transaction
    pub max_registration_names: usize,
    /// Registration years allowed per name
    pub max_registration_quantity: u32,
    /// Bids per committed auction bundle
    pub max_bid_batch: usize,
    /// How long auction boundaries are served from cache
    pub phase_cache_ttl_secs: u64,
    /// Wallet error code meaning "user declined"
    pub user_rejected_code: i64,
    /// Reveal name hashes only, without publishing preimages
    pub enhanced_privacy: bool,
    /// Where the bundle store is persisted, if on disk
    pub store_path: Option<PathBuf>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            chain_id: 43114,
            max_registration_names: MAX_REGISTRATION_NAMES,
            max_registration_quantity: MAX_REGISTRATION_QUANTITY,
            max_bid_batch: MAX_BID_BATCH,
            phase_cache_ttl_secs: PHASE_CACHE_TTL_SECS,
            user_rejected_code: USER_REJECTED_CODE,
            enhanced_privacy: false,
            store_path: None,
        }
    }
}

impl SdkConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SdkConfig =
            serde_json::from_str(json).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_registration_names == 0 {
            return Err(SdkError::Config("max_registration_names must be at least 1".into()));
        }
        if self.max_bid_batch == 0 {
            return Err(SdkError::Config("max_bid_batch must be at least 1".into()));
        }
        if self.max_registration_quantity == 0 {
            return Err(SdkError::Config("max_registration_quantity must be at least 1".into()));
        }
        Ok(())
    }
}
