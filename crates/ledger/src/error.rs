use thiserror::Error;

use familynet_core::{Coins, FamilyName};

/// Errors that abort a ledger operation.
///
/// Only transfers fail loudly. Loan denials, unknown loan ids, empty pools and
/// deferred allowances are reported as events instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid 2FA code")]
    InvalidTwoFactor,

    #[error("insufficient balance: {balance} available, {amount} requested")]
    InsufficientBalance { balance: Coins, amount: Coins },

    #[error("unknown family: {0}")]
    UnknownFamily(String),

    #[error("{0} cannot transact with itself")]
    SelfTransfer(FamilyName),
}
