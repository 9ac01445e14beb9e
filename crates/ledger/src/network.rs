//! Registry of families and the batch operations that span them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use familynet_core::{Coins, FamilyName};
use familynet_events::EventSink;

use crate::error::LedgerError;
use crate::family::{Family, FamilyEvent};
use crate::policy::LedgerPolicy;
use crate::snapshot::{FamilySnapshot, NetworkSnapshot};
use crate::transaction::TransactionRecord;

/// Balance change applied to one family by [`Network::organize_event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub family: FamilyName,
    pub delta: Coins,
    pub new_balance: Coins,
}

/// Owns every family, in registration order. Batch operations visit families
/// in that order.
#[derive(Debug, Clone, Default)]
pub struct Network {
    policy: LedgerPolicy,
    families: Vec<Family>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: LedgerPolicy) -> Self {
        Self {
            policy,
            families: Vec::new(),
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Create and register a family under the network's policy.
    pub fn add_family(&mut self, name: impl Into<FamilyName>) -> &mut Family {
        let family = Family::new(name, self.policy);
        self.register(family)
    }

    /// Register a pre-built family. A family already registered under the same
    /// name is replaced in place and keeps its position.
    pub fn register(&mut self, family: Family) -> &mut Family {
        let index = match self.position(family.name().as_str()) {
            Some(index) => {
                tracing::debug!(family = %family.name(), "replacing registered family");
                self.families[index] = family;
                index
            }
            None => {
                self.families.push(family);
                self.families.len() - 1
            }
        };
        &mut self.families[index]
    }

    pub fn family(&self, name: &str) -> Option<&Family> {
        self.families.iter().find(|f| f.name().as_str() == name)
    }

    pub fn family_mut(&mut self, name: &str) -> Option<&mut Family> {
        self.families.iter_mut().find(|f| f.name().as_str() == name)
    }

    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.iter()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.families.iter().position(|f| f.name().as_str() == name)
    }

    fn position_or_err(&self, name: &str) -> Result<usize, LedgerError> {
        self.position(name)
            .ok_or_else(|| LedgerError::UnknownFamily(name.to_string()))
    }

    /// Two distinct families, mutably.
    fn pair_mut(&mut self, a: &str, b: &str) -> Result<(&mut Family, &mut Family), LedgerError> {
        let i = self.position_or_err(a)?;
        let j = self.position_or_err(b)?;
        if i == j {
            return Err(LedgerError::SelfTransfer(self.families[i].name().clone()));
        }
        if i < j {
            let (left, right) = self.families.split_at_mut(j);
            Ok((&mut left[i], &mut right[0]))
        } else {
            let (left, right) = self.families.split_at_mut(i);
            Ok((&mut right[0], &mut left[j]))
        }
    }

    /// Two-factor guarded transfer between two registered families.
    pub fn transact<S>(
        &mut self,
        from: &str,
        to: &str,
        amount: Coins,
        code: &str,
        now: DateTime<Utc>,
        sink: &mut S,
    ) -> Result<TransactionRecord, LedgerError>
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let (sender, recipient) = self.pair_mut(from, to)?;
        sender.transact(recipient, amount, code, now, sink)
    }

    /// Allowance between two registered families.
    pub fn set_allowance<S>(
        &mut self,
        from: &str,
        to: &str,
        amount: Coins,
        interval: Duration,
        now: DateTime<Utc>,
        sink: &mut S,
    ) -> Result<(), LedgerError>
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let recipient = self.families[self.position_or_err(to)?].name().clone();
        let index = self.position_or_err(from)?;
        self.families[index].set_allowance(&recipient, amount, interval, now, sink);
        Ok(())
    }

    /// Mine every family's pool. Returns the total reward minted.
    pub fn mine_all_transactions<S>(&mut self, now: DateTime<Utc>, sink: &mut S) -> Coins
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let mut minted = Coins::ZERO;
        for family in &mut self.families {
            minted += family.mine(now, sink);
        }
        minted
    }

    /// Pay every due allowance. Each family's payouts are credited before the
    /// next family pays, so money received can be passed on in the same round.
    ///
    /// Allowances to a family that is not registered are held back: the
    /// sender keeps the money, nothing is pooled and the allowance stays due.
    ///
    /// Returns the number of payments delivered.
    pub fn process_allowances<S>(&mut self, now: DateTime<Utc>, sink: &mut S) -> usize
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let mut delivered = 0;
        for i in 0..self.families.len() {
            let undeliverable: Vec<FamilyName> = self.families[i]
                .allowances()
                .iter()
                .map(|a| &a.recipient)
                .filter(|r| self.position(r.as_str()).is_none())
                .cloned()
                .collect();

            let payouts = self.families[i].pay_allowances(now, &undeliverable, sink);
            for payout in payouts {
                // Unregistered recipients were held back above.
                let Some(j) = self.position(payout.to.as_str()) else {
                    continue;
                };
                self.families[j].receive_funds(&payout.from, payout.amount, now, sink);
                delivered += 1;
            }
        }
        delivered
    }

    /// Set every balance to the network mean.
    ///
    /// The mean is rounded to the nearest milli-coin (halves away from zero),
    /// so the total moves by at most half a milli-coin per family. An empty
    /// network is left alone.
    pub fn organize_event<S>(&mut self, now: DateTime<Utc>, sink: &mut S) -> Vec<Adjustment>
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        if self.families.is_empty() {
            return Vec::new();
        }

        let total: i128 = self
            .families
            .iter()
            .map(|f| i128::from(f.balance().millis()))
            .sum();
        let mean = Coins::from_millis(rounded_mean(total, self.families.len()));
        tracing::info!(
            families = self.families.len(),
            mean = %mean,
            "organizing network event to equalize family balances"
        );

        let mut adjustments = Vec::with_capacity(self.families.len());
        for family in &mut self.families {
            let delta = family.equalize_to(mean, now, sink);
            adjustments.push(Adjustment {
                family: family.name().clone(),
                delta,
                new_balance: family.balance(),
            });
        }
        adjustments
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            families: self.families.iter().map(FamilySnapshot::from).collect(),
        }
    }
}

/// `total / count` rounded to the nearest integer, halves away from zero.
///
/// The mean of `i64` values always fits back into an `i64`.
fn rounded_mean(total: i128, count: usize) -> i64 {
    let count = count as i128;
    let half = count / 2;
    let mean = if total >= 0 {
        (total + half) / count
    } else {
        (total - half) / count
    };
    mean as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::two_factor::fixtures::{CODE_A, SECRET_A, secret_a, secret_b};
    use chrono::TimeZone;
    use familynet_events::{Event, InMemoryEventSink};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn family_with_balance(name: &str, balance: Coins) -> Family {
        let policy = LedgerPolicy {
            starting_balance: balance,
            ..LedgerPolicy::default()
        };
        Family::new(name, policy)
    }

    fn network_of(balances: &[i64]) -> Network {
        let mut network = Network::new();
        for (i, b) in balances.iter().enumerate() {
            network.register(family_with_balance(&format!("F{i}"), Coins::from_millis(*b)));
        }
        network
    }

    fn two_families() -> Network {
        let mut network = Network::new();
        network.register(Family::with_secret("Smith", LedgerPolicy::default(), secret_a()));
        network.register(Family::with_secret("Johnson", LedgerPolicy::default(), secret_b()));
        network
    }

    #[test]
    fn added_families_start_at_one_hundred() {
        let mut network = Network::new();
        network.add_family("Smith");
        network.add_family("Johnson");

        assert_eq!(network.len(), 2);
        assert_eq!(network.family("Smith").unwrap().balance(), Coins::new(100));
        assert!(network.family("Nobody").is_none());
    }

    #[test]
    fn duplicate_name_replaces_in_place() {
        let mut network = Network::new();
        network.add_family("A");
        network.add_family("B");
        network.register(family_with_balance("A", Coins::new(7)));

        let names: Vec<&str> = network.families().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(network.family("A").unwrap().balance(), Coins::new(7));
    }

    #[test]
    fn organize_event_moves_everyone_to_the_mean() {
        let mut network = network_of(&[80_000, 120_000, 100_000]);
        let mut sink = InMemoryEventSink::new();

        let adjustments = network.organize_event(t0(), &mut sink);

        let deltas: Vec<Coins> = adjustments.iter().map(|a| a.delta).collect();
        assert_eq!(deltas, vec![Coins::new(20), Coins::new(-20), Coins::ZERO]);
        assert!(network.families().all(|f| f.balance() == Coins::new(100)));
        assert_eq!(sink.len(), 3);
    }

    #[test]
    fn organize_event_rounds_the_mean_to_the_nearest_milli() {
        // 300.002 / 3 = 100.000667
        let mut network = network_of(&[100_002, 100_000, 100_000]);
        let mut sink = InMemoryEventSink::new();

        network.organize_event(t0(), &mut sink);

        assert!(network.families().all(|f| f.balance() == Coins::from_millis(100_001)));
    }

    #[test]
    fn rounded_mean_rounds_halves_away_from_zero() {
        assert_eq!(rounded_mean(5, 2), 3);
        assert_eq!(rounded_mean(-5, 2), -3);
        assert_eq!(rounded_mean(1, 3), 0);
        assert_eq!(rounded_mean(2, 3), 1);
        assert_eq!(rounded_mean(-2, 3), -1);
        assert_eq!(rounded_mean(300_002, 3), 100_001);
    }

    #[test]
    fn organize_event_on_empty_network_is_a_no_op() {
        let mut network = Network::new();
        let mut sink = InMemoryEventSink::new();
        assert!(network.organize_event(t0(), &mut sink).is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn transact_through_the_registry() {
        let mut network = two_families();
        let mut sink = InMemoryEventSink::new();

        network
            .transact("Smith", "Johnson", Coins::new(20), CODE_A, t0(), &mut sink)
            .unwrap();

        assert_eq!(network.family("Smith").unwrap().balance(), Coins::new(80));
        assert_eq!(network.family("Johnson").unwrap().balance(), Coins::new(120));
    }

    #[test]
    fn transact_rejects_unknown_and_self() {
        let mut network = two_families();
        let mut sink = InMemoryEventSink::new();

        let unknown = network
            .transact("Smith", "Ghost", Coins::new(1), CODE_A, t0(), &mut sink)
            .unwrap_err();
        assert_eq!(unknown, LedgerError::UnknownFamily("Ghost".to_string()));

        let itself = network
            .transact("Smith", "Smith", Coins::new(1), CODE_A, t0(), &mut sink)
            .unwrap_err();
        assert_eq!(itself, LedgerError::SelfTransfer(FamilyName::new("Smith")));
        assert!(sink.is_empty());
    }

    #[test]
    fn transact_works_in_either_registration_order() {
        let mut network = Network::new();
        network.register(Family::with_secret("Johnson", LedgerPolicy::default(), secret_b()));
        network.register(Family::with_secret("Smith", LedgerPolicy::default(), secret_a()));
        let mut sink = InMemoryEventSink::new();

        network
            .transact("Smith", "Johnson", Coins::new(5), CODE_A, t0(), &mut sink)
            .unwrap();

        assert_eq!(network.family("Johnson").unwrap().balance(), Coins::new(105));
    }

    #[test]
    fn allowances_are_delivered_once_per_interval() {
        let mut network = two_families();
        let mut sink = InMemoryEventSink::new();
        network
            .set_allowance("Smith", "Johnson", Coins::new(5), Duration::weeks(1), t0(), &mut sink)
            .unwrap();

        assert_eq!(network.process_allowances(t0(), &mut sink), 0);
        assert_eq!(network.process_allowances(t0() + Duration::weeks(1), &mut sink), 1);
        assert_eq!(network.process_allowances(t0() + Duration::weeks(1), &mut sink), 0);

        assert_eq!(network.family("Smith").unwrap().balance(), Coins::new(95));
        assert_eq!(network.family("Johnson").unwrap().balance(), Coins::new(105));
    }

    #[test]
    fn allowance_to_unregistered_family_is_rejected() {
        let mut network = two_families();
        let mut sink = InMemoryEventSink::new();

        let err = network
            .set_allowance("Smith", "Ghost", Coins::new(5), Duration::weeks(1), t0(), &mut sink)
            .unwrap_err();

        assert_eq!(err, LedgerError::UnknownFamily("Ghost".to_string()));
        assert!(network.family("Smith").unwrap().allowances().is_empty());
    }

    #[test]
    fn allowances_to_unregistered_recipients_are_held_back() {
        let mut network = two_families();
        let mut sink = InMemoryEventSink::new();
        let ghost = FamilyName::new("Ghost");
        network
            .family_mut("Smith")
            .unwrap()
            .set_allowance(&ghost, Coins::new(5), Duration::zero(), t0(), &mut sink);

        assert_eq!(network.process_allowances(t0(), &mut sink), 0);
        let smith = network.family("Smith").unwrap();
        assert_eq!(smith.balance(), Coins::new(100));
        assert!(smith.transaction_pool().is_empty());
        assert_eq!(smith.allowance(&ghost).unwrap().last_paid, t0());
        assert_eq!(
            sink.event_types().last(),
            Some(&"ledger.family.allowance_undeliverable")
        );

        assert_eq!(network.mine_all_transactions(t0(), &mut sink), Coins::ZERO);
        assert_eq!(network.family("Smith").unwrap().balance(), Coins::new(100));
    }

    #[test]
    fn received_allowance_is_passed_on_in_the_same_round() {
        let mut network = network_of(&[10_000, 0, 0]);
        let mut sink = InMemoryEventSink::new();
        network
            .set_allowance("F0", "F1", Coins::new(5), Duration::zero(), t0(), &mut sink)
            .unwrap();
        network
            .set_allowance("F1", "F2", Coins::new(5), Duration::zero(), t0(), &mut sink)
            .unwrap();

        assert_eq!(network.process_allowances(t0(), &mut sink), 2);

        let balances: Vec<Coins> = network.families().map(|f| f.balance()).collect();
        assert_eq!(balances, vec![Coins::new(5), Coins::ZERO, Coins::new(5)]);
        assert!(sink.events().all(|e| !e.is_rejection()));
    }

    #[test]
    fn mine_all_sums_rewards() {
        let mut network = two_families();
        let mut sink = InMemoryEventSink::new();
        network
            .transact("Smith", "Johnson", Coins::new(1), CODE_A, t0(), &mut sink)
            .unwrap();
        network
            .transact("Smith", "Johnson", Coins::new(1), CODE_A, t0(), &mut sink)
            .unwrap();

        let minted = network.mine_all_transactions(t0(), &mut sink);

        assert_eq!(minted, Coins::from_millis(200));
        assert_eq!(network.family("Smith").unwrap().balance(), Coins::from_millis(98_200));
        assert_eq!(network.family("Johnson").unwrap().balance(), Coins::new(102));
    }

    #[test]
    fn snapshot_never_contains_the_secret() {
        let network = two_families();
        let json = serde_json::to_string(&network.snapshot()).unwrap();
        assert!(!json.contains(SECRET_A));
        assert!(json.contains("\"Smith\""));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after equalization all balances are equal and the total
        /// moves by at most half a milli-coin per family.
        #[test]
        fn equalization_levels_balances(
            balances in prop::collection::vec(-1_000_000i64..1_000_000i64, 1..12)
        ) {
            let mut network = network_of(&balances);
            let mut sink = InMemoryEventSink::new();
            let before = network.snapshot().total_balance();

            let adjustments = network.organize_event(t0(), &mut sink);

            let first = adjustments[0].new_balance;
            prop_assert!(network.families().all(|f| f.balance() == first));
            let drift = (before - network.snapshot().total_balance()).millis().abs();
            prop_assert!(2 * drift <= balances.len() as i64);
        }
    }
}
