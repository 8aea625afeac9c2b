// ============ Bundle Store ============
// Maps a commitment hash to the inputs needed to reveal it. Entries are
// append-only: a key is written once and afterwards only its state moves
// forward (uncommitted -> committed -> revealed). The file-backed store is
// the one users are told to back up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use avvy_types::{Bundle, BundleState, Hash32};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::SdkConfig;
use crate::error::SdkError;

const STORE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("bundle {0} is already recorded")]
    Duplicate(Hash32),
    #[error("bundle {0} not found")]
    NotFound(Hash32),
    #[error("bundle {key} cannot move from {from:?} to {to:?}")]
    Regression {
        key: Hash32,
        from: BundleState,
        to: BundleState,
    },
    #[error("unsupported store version {0}")]
    Version(u32),
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Record a new bundle; existing keys are never overwritten
    async fn insert(&self, bundle: Bundle) -> Result<(), StoreError>;

    async fn get(&self, key: &Hash32) -> Result<Option<Bundle>, StoreError>;

    /// Move a bundle forward; repeating the current state is a no-op
    async fn advance(&self, key: &Hash32, state: BundleState) -> Result<Bundle, StoreError>;

    async fn list(&self) -> Result<Vec<Bundle>, StoreError>;

    async fn mark_committed(&self, key: &Hash32) -> Result<Bundle, StoreError> {
        self.advance(key, BundleState::Committed).await
    }

    async fn mark_revealed(&self, key: &Hash32) -> Result<Bundle, StoreError> {
        self.advance(key, BundleState::Revealed).await
    }
}

// ============ Shared Map Logic ============

type BundleMap = BTreeMap<Hash32, Bundle>;

fn insert_into(map: &mut BundleMap, bundle: Bundle) -> Result<(), StoreError> {
    if map.contains_key(&bundle.key) {
        return Err(StoreError::Duplicate(bundle.key));
    }
    map.insert(bundle.key, bundle);
    Ok(())
}

fn advance_in(map: &mut BundleMap, key: &Hash32, state: BundleState) -> Result<Bundle, StoreError> {
    let bundle = map.get_mut(key).ok_or(StoreError::NotFound(*key))?;
    if state < bundle.state {
        return Err(StoreError::Regression { key: *key, from: bundle.state, to: state });
    }
    bundle.state = state;
    Ok(bundle.clone())
}

// ============ In-Memory Store ============

#[derive(Default)]
pub struct MemoryBundleStore {
    bundles: Mutex<BundleMap>,
}

impl MemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BundleStore for MemoryBundleStore {
    async fn insert(&self, bundle: Bundle) -> Result<(), StoreError> {
        insert_into(&mut *self.bundles.lock().await, bundle)
    }

    async fn get(&self, key: &Hash32) -> Result<Option<Bundle>, StoreError> {
        Ok(self.bundles.lock().await.get(key).cloned())
    }

    async fn advance(&self, key: &Hash32, state: BundleState) -> Result<Bundle, StoreError> {
        advance_in(&mut *self.bundles.lock().await, key, state)
    }

    async fn list(&self) -> Result<Vec<Bundle>, StoreError> {
        Ok(self.bundles.lock().await.values().cloned().collect())
    }
}

// ============ JSON File Store ============

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    bundles: Vec<Bundle>,
}

/// Read a store file without opening a store; a missing file is empty
pub fn read_bundle_file(path: impl AsRef<Path>) -> Result<Vec<Bundle>, StoreError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file: StoreFile = serde_json::from_slice(&std::fs::read(path)?)?;
    if file.version != STORE_VERSION {
        return Err(StoreError::Version(file.version));
    }
    Ok(file.bundles)
}

pub fn write_bundle_file(path: impl AsRef<Path>, bundles: &[Bundle]) -> Result<(), StoreError> {
    let json = encode(bundles)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn encode(bundles: &[Bundle]) -> Result<Vec<u8>, StoreError> {
    let file = StoreFile { version: STORE_VERSION, bundles: bundles.to_vec() };
    Ok(serde_json::to_vec_pretty(&file)?)
}

/// Write-through store persisted as a single JSON document.
/// Every mutation rewrites the file via a temp file and rename.
pub struct JsonFileBundleStore {
    path: PathBuf,
    bundles: Mutex<BundleMap>,
}

impl JsonFileBundleStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let bundles = read_bundle_file(&path)?
            .into_iter()
            .map(|b| (b.key, b))
            .collect::<BundleMap>();
        debug!(path = %path.display(), count = bundles.len(), "opened bundle store");
        Ok(Self { path, bundles: Mutex::new(bundles) })
    }

    /// Open the file named by `store_path`
    pub fn from_config(config: &SdkConfig) -> crate::error::Result<Self> {
        let path = config
            .store_path
            .clone()
            .ok_or_else(|| SdkError::Config("store_path is not set".into()))?;
        Ok(Self::open(path)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, map: &BundleMap) -> Result<(), StoreError> {
        let bundles: Vec<Bundle> = map.values().cloned().collect();
        let json = encode(&bundles)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl BundleStore for JsonFileBundleStore {
    async fn insert(&self, bundle: Bundle) -> Result<(), StoreError> {
        let mut map = self.bundles.lock().await;
        let key = bundle.key;
        insert_into(&mut map, bundle)?;
        if let Err(e) = self.persist(&map).await {
            // Not durable, so not recorded
            map.remove(&key);
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, key: &Hash32) -> Result<Option<Bundle>, StoreError> {
        Ok(self.bundles.lock().await.get(key).cloned())
    }

    async fn advance(&self, key: &Hash32, state: BundleState) -> Result<Bundle, StoreError> {
        let mut map = self.bundles.lock().await;
        let previous = map.get(key).map(|b| b.state);
        let bundle = advance_in(&mut map, key, state)?;
        if let Err(e) = self.persist(&map).await {
            if let (Some(prev), Some(entry)) = (previous, map.get_mut(key)) {
                entry.state = prev;
            }
            return Err(e);
        }
        Ok(bundle)
    }

    async fn list(&self) -> Result<Vec<Bundle>, StoreError> {
        Ok(self.bundles.lock().await.values().cloned().collect())
    }
}
