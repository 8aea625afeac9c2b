// ============ Collaborator Interfaces ============
// The name-service contracts and the prover.
//
// Both are black boxes to the orchestrators. Every contract call is
// asynchronous and may fail with a wallet rejection or an RPC/chain error,
// both surfaced as `ClientError`.

use async_trait::async_trait;
use avvy_types::{Hash32, Item, Name, Proof, ProofPair, Salt, TxReceipt};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ProverError};

/// Encoded name preimage, published when revealing without enhanced privacy
pub type Preimage = Vec<u8>;

/// A bid the contract recorded as revealed for the connected account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedBid {
    pub name_hash: Hash32,
    pub amount: u128,
    pub timestamp: u64,
    /// Known only if the name's preimage has been published
    pub name: Option<Name>,
}

/// Winner of a finished auction as recorded on-chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningBid {
    pub winner: String,
    pub auction_price: u128,
    /// Set once the name has been claimed
    pub owner: Option<String>,
}

#[async_trait]
pub trait ContractClient: Send + Sync {
    // ============ Auction ============

    /// `[bid_start, reveal_start, claim_start, claim_end]` in seconds
    async fn auction_phase_boundaries(&self) -> Result<[u64; 4], ClientError>;

    async fn submit_bid_commit(&self, hash: &Hash32) -> Result<TxReceipt, ClientError>;

    async fn submit_reveal(&self, items: &[Item], salt: &Salt) -> Result<TxReceipt, ClientError>;

    async fn submit_reveal_with_preimage(
        &self,
        items: &[Item],
        salt: &Salt,
        preimages: &[Preimage],
    ) -> Result<TxReceipt, ClientError>;

    async fn submit_claim(&self, names: &[Name], proofs: &[Proof]) -> Result<TxReceipt, ClientError>;

    async fn revealed_bids(&self) -> Result<Vec<RevealedBid>, ClientError>;

    /// `None` when the auction for this name had no winner
    async fn winning_bid(&self, name: &Name) -> Result<Option<WinningBid>, ClientError>;

    // ============ Registration ============

    async fn submit_registration_commit(&self, hash: &Hash32) -> Result<TxReceipt, ClientError>;

    async fn submit_registration(
        &self,
        items: &[Item],
        proofs: &[ProofPair],
        salt: &Salt,
        value: u128,
        preimages: Option<&[Preimage]>,
    ) -> Result<TxReceipt, ClientError>;

    /// Per-name premium currently charged on top of the base price
    async fn registration_premium(&self) -> Result<u128, ClientError>;

    /// Smallest currency units per USD cent
    async fn conversion_rate(&self) -> Result<u128, ClientError>;

    // ============ WAVAX ============

    async fn wavax_balance(&self) -> Result<u128, ClientError>;

    /// Amount the auction contract may currently pull
    async fn wavax_allowance(&self) -> Result<u128, ClientError>;

    async fn wrap_avax(&self, amount: u128) -> Result<TxReceipt, ClientError>;

    async fn approve_wavax(&self, amount: u128) -> Result<TxReceipt, ClientError>;

    // ============ Names ============

    async fn name_hash(&self, name: &Name) -> Result<Hash32, ClientError> {
        Ok(name.hash())
    }

    async fn build_preimages(&self, names: &[Name]) -> Result<Vec<Preimage>, ClientError> {
        Ok(names.iter().map(|n| n.as_str().as_bytes().to_vec()).collect())
    }
}

/// Raw prover output, passed back to `verify` and `calldata` unchanged
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResult {
    pub circuit: String,
    pub public_signals: Vec<String>,
    pub proof: Vec<u8>,
}

#[async_trait]
pub trait ProofService: Send + Sync {
    async fn prove(&self, circuit: &str, inputs: &serde_json::Value) -> Result<ProofResult, ProverError>;

    async fn verify(&self, circuit: &str, result: &ProofResult) -> Result<bool, ProverError>;

    async fn calldata(&self, result: &ProofResult) -> Result<Proof, ProverError>;
}
