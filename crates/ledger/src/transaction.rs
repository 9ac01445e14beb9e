use serde::{Deserialize, Serialize};

use familynet_core::{Coins, FamilyName, ValueObject};

/// A completed transfer, as kept in the sender's pool until mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub from: FamilyName,
    pub to: FamilyName,
    pub amount: Coins,
}

impl ValueObject for TransactionRecord {}

impl TransactionRecord {
    pub fn new(from: FamilyName, to: FamilyName, amount: Coins) -> Self {
        Self { from, to, amount }
    }
}
