// ============ Registration Pricing ============
// Registration cost estimate

use avvy_commitment::CommitmentError;
use avvy_types::{BundleKind, Item, ItemValue, Name};

use crate::error::{Result, SdkError};

/// Yearly price in USD cents, by label length
pub fn name_price_usd_cents(name: &Name) -> u128 {
    match name.label().chars().count() {
        3 => 64_000,
        4 => 16_000,
        _ => 500,
    }
}

/// Transaction value for registering `items`:
/// sum(years * price * rate) + premium * count.
///
/// `rate` is smallest currency units per USD cent.
pub fn registration_value(items: &[Item], rate: u128, premium: u128) -> Result<u128> {
    let mut total: u128 = 0;
    for (index, item) in items.iter().enumerate() {
        let years = match item.value {
            ItemValue::Quantity(q) => u128::from(q),
            ItemValue::Amount(_) => {
                return Err(CommitmentError::ValueKind { index, kind: BundleKind::Registration }.into());
            }
        };
        let cost = years
            .checked_mul(name_price_usd_cents(&item.name))
            .and_then(|c| c.checked_mul(rate))
            .ok_or(SdkError::Overflow("registration price"))?;
        total = total.checked_add(cost).ok_or(SdkError::Overflow("registration total"))?;
    }
    let premiums = premium
        .checked_mul(items.len() as u128)
        .ok_or(SdkError::Overflow("registration premium"))?;
    total.checked_add(premiums).ok_or(SdkError::Overflow("registration value"))
}
