// ============ Avvy Types ============
// Shared data model for the .avax registration and sunrise auction workflows
// Every persisted structure (bundles, proofs, salts) lives here so the SDK,
// the inspection tool and the test suite agree on one encoding.

pub mod name;

pub use name::{is_supported, is_supported_with, name_hash, Blocklist, Name, NoBlocklist, ValidationError};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============ Namespace Constants ============

pub const NAMESPACE: &str = "avax";
pub const MIN_LABEL_LEN: usize = 3;
pub const MAX_LABEL_LEN: usize = 62;

// ============ Workflow Defaults ============

/// Names finalized per registration transaction
pub const MAX_REGISTRATION_NAMES: usize = 5;
/// Upper bound on registration years per name
pub const MAX_REGISTRATION_QUANTITY: u32 = 5;
/// Bids committed per auction bundle
pub const MAX_BID_BATCH: usize = 20;
/// Auction boundaries may be served from cache for this long
pub const PHASE_CACHE_TTL_SECS: u64 = 300;
/// EIP-1193 "user rejected request"
pub const USER_REJECTED_CODE: i64 = 4001;

// ============ Errors ============

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseBytesError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

fn decode_hex(input: &str) -> Result<Vec<u8>, ParseBytesError> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    Ok(hex::decode(trimmed)?)
}

fn decode_fixed(input: &str) -> Result<[u8; 32], ParseBytesError> {
    let bytes = decode_hex(input)?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| ParseBytesError::Length { expected: 32, actual })
}

// ============ Hash ============

/// 32-byte digest: commitment hashes, name hashes, transaction hashes
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(input: &str) -> Result<Self, ParseBytesError> {
        decode_fixed(input).map(Hash32)
    }

    /// First 8 hex digits, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash32::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============ Salt ============

/// Per-batch secret mixed into a commitment.
/// Losing it makes the bundle unrevealable, so it is persisted before the
/// commit transaction is sent.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(input: &str) -> Result<Self, ParseBytesError> {
        decode_fixed(input).map(Salt)
    }
}

// Salts are secrets until reveal; keep them out of logs.
impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Salt(..)")
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Salt::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============ Proofs ============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProofKind {
    Pricing,
    Constraints,
}

impl ProofKind {
    pub const ALL: [ProofKind; 2] = [ProofKind::Pricing, ProofKind::Constraints];

    /// Circuit name understood by the prover
    pub fn circuit(&self) -> &'static str {
        match self {
            ProofKind::Pricing => "PriceCheck",
            ProofKind::Constraints => "Constraints",
        }
    }
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofKind::Pricing => f.write_str("pricing"),
            ProofKind::Constraints => f.write_str("constraints"),
        }
    }
}

/// Opaque verifier calldata produced by the prover
#[derive(Clone, PartialEq, Eq)]
pub struct Proof(pub Vec<u8>);

impl Proof {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    pub fn from_hex(input: &str) -> Result<Self, ParseBytesError> {
        decode_hex(input).map(Proof)
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proof({} bytes)", self.0.len())
    }
}

impl Serialize for Proof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Proof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Proof::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Both proofs a registration needs for one name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPair {
    pub pricing: Proof,
    pub constraints: Proof,
}

// ============ Items ============

/// Registration years or bid amount (smallest currency unit)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemValue {
    Quantity(u32),
    Amount(u128),
}

impl ItemValue {
    pub fn as_u128(&self) -> u128 {
        match *self {
            ItemValue::Quantity(q) => q as u128,
            ItemValue::Amount(a) => a,
        }
    }
}

/// One (name, value) record. Batches are ordered sequences of these,
/// never parallel arrays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: Name,
    pub value: ItemValue,
}

impl Item {
    pub fn bid(name: Name, amount: u128) -> Self {
        Self { name, value: ItemValue::Amount(amount) }
    }

    pub fn registration(name: Name, years: u32) -> Self {
        Self { name, value: ItemValue::Quantity(years) }
    }
}

// ============ Bundles ============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleKind {
    Auction,
    Registration,
}

impl BundleKind {
    pub fn tag(&self) -> u8 {
        match self {
            BundleKind::Auction => 0,
            BundleKind::Registration => 1,
        }
    }
}

/// Ordered: a bundle only ever moves forward
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BundleState {
    Uncommitted,
    Committed,
    Revealed,
}

/// Everything needed to reveal a commitment later, keyed by the commitment hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub key: Hash32,
    pub kind: BundleKind,
    pub items: Vec<Item>,
    /// Empty for auction bids; one pair per item for registrations
    #[serde(default)]
    pub proofs: Vec<ProofPair>,
    pub salt: Salt,
    pub state: BundleState,
    pub created_at: u64,
}

impl Bundle {
    pub fn names(&self) -> Vec<Name> {
        self.items.iter().map(|item| item.name.clone()).collect()
    }
}

// ============ Chain Results ============

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: Hash32,
    pub block_number: u64,
}

/// Outcome of the sunrise auction for one name, from the caller's point of view
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionResult {
    NoWinner,
    HasWinner {
        winner: String,
        auction_price: u128,
        is_winner: bool,
    },
    IsClaimed {
        owner: String,
        winner: String,
        auction_price: u128,
        is_winner: bool,
    },
}

impl AuctionResult {
    /// Won by the caller and not yet claimed
    pub fn is_claimable(&self) -> bool {
        matches!(self, AuctionResult::HasWinner { is_winner: true, .. })
    }

    pub fn auction_price(&self) -> Option<u128> {
        match self {
            AuctionResult::NoWinner => None,
            AuctionResult::HasWinner { auction_price, .. }
            | AuctionResult::IsClaimed { auction_price, .. } => Some(*auction_price),
        }
    }
}

// ============ Tests ============
