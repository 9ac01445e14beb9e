//! Serializable end-of-run views. Secrets are never included.

use serde::{Deserialize, Serialize};

use familynet_core::{Coins, FamilyName};

use crate::allowance::AllowanceView;
use crate::family::Family;
use crate::loan::Loan;
use crate::transaction::TransactionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySnapshot {
    pub name: FamilyName,
    pub balance: Coins,
    pub transaction_pool: Vec<TransactionRecord>,
    pub allowances: Vec<AllowanceView>,
    pub loans: Vec<Loan>,
}

impl From<&Family> for FamilySnapshot {
    fn from(family: &Family) -> Self {
        Self {
            name: family.name().clone(),
            balance: family.balance(),
            transaction_pool: family.transaction_pool().to_vec(),
            allowances: family.allowances().iter().map(AllowanceView::from).collect(),
            loans: family.loans().to_vec(),
        }
    }
}

/// Every family, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub families: Vec<FamilySnapshot>,
}

impl NetworkSnapshot {
    pub fn total_balance(&self) -> Coins {
        self.families.iter().map(|f| f.balance).sum()
    }
}
