// ============ WAVAX Funding ============
// Winning bids are paid in WAVAX pulled by the auction contract, together
// with the first-year registration fee of each name. The account needs
// enough balance and allowance to cover both for every revealed bid.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavaxStatus {
    pub balance: u128,
    pub allowance: u128,
    /// Total of the account's revealed bids
    pub bid_total: u128,
    /// Registration fees of the revealed names
    pub registration_fees: u128,
    /// bid_total + registration_fees
    pub required: u128,
}

impl WavaxStatus {
    pub fn new(balance: u128, allowance: u128, bid_total: u128, registration_fees: u128) -> Result<Self> {
        let required = bid_total
            .checked_add(registration_fees)
            .ok_or(SdkError::Overflow("WAVAX requirement"))?;
        Ok(Self { balance, allowance, bid_total, registration_fees, required })
    }

    /// WAVAX still to wrap before every bid can be paid
    pub fn wrap_shortfall(&self) -> u128 {
        self.required.saturating_sub(self.balance)
    }

    /// Additional allowance the auction contract needs
    pub fn approval_shortfall(&self) -> u128 {
        self.required.saturating_sub(self.allowance)
    }

    pub fn is_funded(&self) -> bool {
        self.wrap_shortfall() == 0 && self.approval_shortfall() == 0
    }
}
