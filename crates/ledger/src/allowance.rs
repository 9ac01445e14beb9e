use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use familynet_core::{Coins, FamilyName};

/// A recurring payment to another family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allowance {
    pub recipient: FamilyName,
    pub amount: Coins,
    pub interval: Duration,
    pub last_paid: DateTime<Utc>,
}

impl Allowance {
    /// Due once a full interval has elapsed since the last payment.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_paid >= self.interval
    }
}

/// Serializable view of an [`Allowance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceView {
    pub recipient: FamilyName,
    pub amount: Coins,
    pub interval_ms: i64,
    pub last_paid: DateTime<Utc>,
}

impl From<&Allowance> for AllowanceView {
    fn from(value: &Allowance) -> Self {
        Self {
            recipient: value.recipient.clone(),
            amount: value.amount,
            interval_ms: value.interval.num_milliseconds(),
            last_paid: value.last_paid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn allowance(interval: Duration) -> Allowance {
        Allowance {
            recipient: FamilyName::new("Johnson"),
            amount: Coins::new(5),
            interval,
            last_paid: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn due_exactly_at_the_interval() {
        let a = allowance(Duration::days(7));
        assert!(!a.is_due(a.last_paid + Duration::days(7) - Duration::milliseconds(1)));
        assert!(a.is_due(a.last_paid + Duration::days(7)));
    }

    #[test]
    fn non_positive_interval_is_always_due() {
        let a = allowance(Duration::milliseconds(-5));
        assert!(a.is_due(a.last_paid));
    }
}
