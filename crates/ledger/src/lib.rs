//! Family ledger: balances, transfers, allowances, loans, mining and the
//! network registry that ties families together.
//!
//! Pure domain logic only: no IO, no clocks, no console output. Callers pass
//! the current time and an event sink into every operation.

pub mod allowance;
pub mod error;
pub mod family;
pub mod loan;
pub mod network;
pub mod policy;
pub mod snapshot;
pub mod transaction;
pub mod two_factor;

pub use allowance::{Allowance, AllowanceView};
pub use error::LedgerError;
pub use family::{Family, FamilyCommand, FamilyEvent};
pub use loan::Loan;
pub use network::{Adjustment, Network};
pub use policy::LedgerPolicy;
pub use snapshot::{FamilySnapshot, NetworkSnapshot};
pub use transaction::TransactionRecord;
pub use two_factor::{SecondFactor, TwoFactorSecret};
