//! Tunable economics of a network.

use serde::{Deserialize, Serialize};

use familynet_core::Coins;

/// Basis points in one whole (100%).
const BPS_PER_UNIT: i128 = 10_000;

/// Numbers every family in a network is created with.
///
/// Defaults: 100 coins to start, 0.1 coin minted per pooled transaction, and
/// a loan needs a balance of at least 10% of the requested amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerPolicy {
    pub starting_balance: Coins,
    pub mining_reward_per_transaction: Coins,
    /// Share of a requested loan the balance must cover, in basis points.
    pub collateral_ratio_bps: u32,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            starting_balance: Coins::new(100),
            mining_reward_per_transaction: Coins::from_millis(100),
            collateral_ratio_bps: 1_000,
        }
    }
}

impl LedgerPolicy {
    /// `balance >= amount * ratio`, evaluated exactly.
    pub fn covers_collateral(&self, balance: Coins, amount: Coins) -> bool {
        i128::from(balance.millis()) * BPS_PER_UNIT
            >= i128::from(amount.millis()) * i128::from(self.collateral_ratio_bps)
    }

    pub fn mining_reward(&self, pooled: usize) -> Coins {
        self.mining_reward_per_transaction.times(pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collateral_threshold_is_inclusive() {
        let policy = LedgerPolicy::default();
        assert!(policy.covers_collateral(Coins::new(5), Coins::new(50)));
        assert!(!policy.covers_collateral(Coins::from_millis(4_999), Coins::new(50)));
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let policy: LedgerPolicy = serde_json::from_str(r#"{"starting_balance": 250}"#).unwrap();
        assert_eq!(policy.starting_balance, Coins::new(250));
        assert_eq!(policy.mining_reward_per_transaction, Coins::from_millis(100));
        assert_eq!(policy.collateral_ratio_bps, 1_000);
    }
}
