use serde::{Deserialize, Serialize};

use familynet_core::{Coins, LoanId};

/// An outstanding loan. Dropped from its family once `remaining <= 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub amount: Coins,
    /// Informational only; nothing enforces the term.
    pub duration_days: u32,
    pub remaining: Coins,
}

