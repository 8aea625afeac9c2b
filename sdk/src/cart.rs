// ============ Cart and Bid Set ============
// Pending work: the registration cart and the set of sunrise bids.
//
// Both keep insertion order, which is the order items are committed in.

use avvy_types::{Blocklist, Hash32, Item, Name, ValidationError};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, SdkError};

// ============ Registration Cart ============

#[derive(Clone, Debug)]
pub struct Cart {
    max_quantity: u32,
    entries: Vec<(Name, u32)>,
}

impl Cart {
    pub fn new(max_quantity: u32) -> Self {
        Self { max_quantity, entries: Vec::new() }
    }

    /// Add a name for one year; returns false if it was already present
    pub fn add(&mut self, name: Name) -> bool {
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, 1));
        true
    }

    pub fn remove(&mut self, name: &Name) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    /// Set registration years, adding the name if needed
    pub fn set_quantity(&mut self, name: Name, quantity: u32) -> Result<()> {
        if quantity == 0 || quantity > self.max_quantity {
            return Err(ValidationError::Quantity { quantity, max: self.max_quantity }.into());
        }
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = quantity,
            None => self.entries.push((name, quantity)),
        }
        Ok(())
    }

    pub fn quantity(&self, name: &Name) -> Option<u32> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, q)| *q)
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> Vec<Name> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn items(&self) -> Vec<Item> {
        self.entries
            .iter()
            .map(|(n, q)| Item::registration(n.clone(), *q))
            .collect()
    }

    /// Drop names that were registered
    pub fn clear(&mut self, names: &[Name]) {
        self.entries.retain(|(n, _)| !names.contains(n));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============ Bid Set ============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BidEntry {
    pub name: Name,
    pub amount: u128,
    /// Commitment the bid was sealed into, once committed
    pub bundle: Option<Hash32>,
}

#[derive(Clone, Debug, Default)]
pub struct BidSet {
    entries: Vec<BidEntry>,
}

impl BidSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or re-price an uncommitted bid
    pub fn add(&mut self, name: Name, amount: u128) -> Result<()> {
        if amount == 0 {
            return Err(ValidationError::Amount("0".into()).into());
        }
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                if let Some(key) = entry.bundle {
                    return Err(sealed(&name, key, "change its amount"));
                }
                entry.amount = amount;
            }
            None => self.entries.push(BidEntry { name, amount, bundle: None }),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &Name) -> Result<bool> {
        if let Some(key) = self.get(name).and_then(|e| e.bundle) {
            return Err(sealed(name, key, "remove it"));
        }
        let before = self.entries.len();
        self.entries.retain(|e| e.name != *name);
        Ok(self.entries.len() != before)
    }

    pub fn get(&self, name: &Name) -> Option<&BidEntry> {
        self.entries.iter().find(|e| e.name == *name)
    }

    pub fn entries(&self) -> &[BidEntry] {
        &self.entries
    }

    /// Bids not yet sealed into a bundle, in insertion order
    pub fn unsubmitted(&self) -> Vec<Item> {
        self.entries
            .iter()
            .filter(|e| e.bundle.is_none())
            .map(|e| Item::bid(e.name.clone(), e.amount))
            .collect()
    }

    /// Fails if any of `names` is already sealed in a bundle
    pub fn ensure_unsealed(&self, names: &[Name]) -> Result<()> {
        match self.entries.iter().find(|e| names.contains(&e.name) && e.bundle.is_some()) {
            Some(BidEntry { name, bundle: Some(key), .. }) => Err(sealed(name, *key, "commit it again")),
            _ => Ok(()),
        }
    }

    pub fn assign_bundle(&mut self, names: &[Name], key: Hash32) {
        for entry in self.entries.iter_mut().filter(|e| names.contains(&e.name)) {
            entry.bundle = Some(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Import bids from a JSON object of `name -> amount`.
    ///
    /// Amounts may be decimal strings or integers. Entries with an
    /// unsupported name or unusable amount are skipped and reported; the
    /// rest are added.
    pub fn import_bulk<B: Blocklist + ?Sized>(&mut self, json: &str, blocklist: &B) -> Result<BulkImportReport> {
        let value: Value = serde_json::from_str(json).map_err(|e| SdkError::Import(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(SdkError::Import("expected a JSON object of name -> amount".into()));
        };

        let mut report = BulkImportReport::default();
        for (raw, amount) in map {
            let outcome = Name::parse_with(&raw.to_lowercase(), blocklist)
                .map_err(|e| e.to_string())
                .and_then(|name| parse_amount(&amount).map(|a| (name, a)));
            match outcome {
                Ok((name, amount)) => match self.add(name.clone(), amount) {
                    Ok(()) => report.added.push(name),
                    Err(e) => report.skipped.push(SkippedBid { input: raw, reason: e.to_string() }),
                },
                Err(reason) => {
                    debug!(input = %raw, %reason, "skipping imported bid");
                    report.skipped.push(SkippedBid { input: raw, reason });
                }
            }
        }
        info!(added = report.added.len(), skipped = report.skipped.len(), "imported bids");
        Ok(report)
    }
}

fn sealed(name: &Name, key: Hash32, action: &str) -> SdkError {
    SdkError::InvalidTransition {
        state: format!("{name} committed in {}", key.short()),
        action: action.into(),
    }
}

fn parse_amount(value: &Value) -> std::result::Result<u128, String> {
    let amount = match value {
        Value::String(s) => s.trim().parse::<u128>().ok(),
        Value::Number(n) => n.as_u64().map(u128::from),
        _ => None,
    };
    match amount {
        Some(a) if a > 0 => Ok(a),
        _ => Err(ValidationError::Amount(value.to_string()).to_string()),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkImportReport {
    pub added: Vec<Name>,
    pub skipped: Vec<SkippedBid>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedBid {
    pub input: String,
    pub reason: String,
}
