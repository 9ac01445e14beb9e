//! Family aggregate: a single participant of the network.
//!
//! Every operation goes through the same lifecycle: build a command, decide
//! the events (`handle_*`, pure), then apply and record them into the
//! caller's [`EventSink`]. Refusals that are not errors (denied loan, unknown
//! loan id, empty pool, unaffordable allowance) are still recorded as events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use familynet_core::{Aggregate, AggregateRoot, Coins, FamilyName, LoanId};
use familynet_events::{Event, EventSink, commit, execute};

use crate::allowance::Allowance;
use crate::error::LedgerError;
use crate::loan::Loan;
use crate::policy::LedgerPolicy;
use crate::transaction::TransactionRecord;
use crate::two_factor::{SecondFactor, TwoFactorSecret};

// ─────────────────────────────────────────────────────────────────────────────
// Family Aggregate
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregate root: Family.
///
/// # Invariants
/// - `name` and the two-factor secret never change after construction.
/// - A loan is present exactly while its `remaining` is above zero.
/// - Allowances and loans keep insertion order; overwriting an allowance keeps
///   its slot.
#[derive(Debug, Clone)]
pub struct Family {
    name: FamilyName,
    balance: Coins,
    transaction_pool: Vec<TransactionRecord>,
    allowances: Vec<Allowance>,
    loans: Vec<Loan>,
    two_factor: TwoFactorSecret,
    policy: LedgerPolicy,
    version: u64,
}

impl Family {
    /// New family with a freshly generated two-factor secret.
    pub fn new(name: impl Into<FamilyName>, policy: LedgerPolicy) -> Self {
        Self::with_secret(name, policy, TwoFactorSecret::generate())
    }

    pub fn with_secret(
        name: impl Into<FamilyName>,
        policy: LedgerPolicy,
        two_factor: TwoFactorSecret,
    ) -> Self {
        Self {
            name: name.into(),
            balance: policy.starting_balance,
            transaction_pool: Vec::new(),
            allowances: Vec::new(),
            loans: Vec::new(),
            two_factor,
            policy,
            version: 0,
        }
    }

    pub fn name(&self) -> &FamilyName {
        &self.name
    }

    pub fn balance(&self) -> Coins {
        self.balance
    }

    pub fn transaction_pool(&self) -> &[TransactionRecord] {
        &self.transaction_pool
    }

    pub fn allowances(&self) -> &[Allowance] {
        &self.allowances
    }

    pub fn allowance(&self, recipient: &FamilyName) -> Option<&Allowance> {
        self.allowances.iter().find(|a| &a.recipient == recipient)
    }

    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn loan(&self, loan_id: &LoanId) -> Option<&Loan> {
        self.loans.iter().find(|l| &l.id == loan_id)
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub fn two_factor_secret(&self) -> &TwoFactorSecret {
        &self.two_factor
    }

    pub fn verify_two_factor(&self, code: &str) -> bool {
        self.two_factor.verify(code)
    }
}

impl AggregateRoot for Family {
    type Id = FamilyName;
    const AGGREGATE_TYPE: &'static str = "family";

    fn id(&self) -> &Self::Id {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command: define (or redefine) a recurring payment to `recipient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetAllowance {
    pub recipient: FamilyName,
    pub amount: Coins,
    pub interval: Duration,
    pub occurred_at: DateTime<Utc>,
}

/// Command: pay every allowance that is due at `occurred_at`.
///
/// Allowances to a recipient listed in `undeliverable` are held back without
/// touching the balance or the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayAllowances {
    pub undeliverable: Vec<FamilyName>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ask for a loan. The id is chosen by the caller so that deciding
/// stays deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLoan {
    pub loan_id: LoanId,
    pub amount: Coins,
    pub duration_days: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepayLoan {
    pub loan_id: LoanId,
    pub amount: Coins,
    pub occurred_at: DateTime<Utc>,
}

/// Command: debit side of a transfer, guarded by the second factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFunds {
    pub to: FamilyName,
    pub amount: Coins,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: credit side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveFunds {
    pub from: FamilyName,
    pub amount: Coins,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mine {
    pub occurred_at: DateTime<Utc>,
}

/// Command: move the balance to `target` (network equalization).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualizeBalance {
    pub target: Coins,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyCommand {
    SetAllowance(SetAllowance),
    PayAllowances(PayAllowances),
    RequestLoan(RequestLoan),
    RepayLoan(RepayLoan),
    SendFunds(SendFunds),
    ReceiveFunds(ReceiveFunds),
    Mine(Mine),
    EqualizeBalance(EqualizeBalance),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceSet {
    pub family: FamilyName,
    pub recipient: FamilyName,
    pub amount: Coins,
    pub interval_ms: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowancePaid {
    pub transfer: TransactionRecord,
    pub occurred_at: DateTime<Utc>,
}

/// The allowance was due but the balance could not cover it; it stays due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceDeferred {
    pub family: FamilyName,
    pub recipient: FamilyName,
    pub amount: Coins,
    pub balance: Coins,
    pub occurred_at: DateTime<Utc>,
}

/// The allowance was due but its recipient cannot be credited; it stays due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceUndeliverable {
    pub family: FamilyName,
    pub recipient: FamilyName,
    pub amount: Coins,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanApproved {
    pub family: FamilyName,
    pub loan_id: LoanId,
    pub amount: Coins,
    pub duration_days: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDenied {
    pub family: FamilyName,
    pub amount: Coins,
    pub duration_days: u32,
    pub balance: Coins,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRepaid {
    pub family: FamilyName,
    pub loan_id: LoanId,
    pub amount: Coins,
    /// Remaining obligation after this repayment.
    pub remaining: Coins,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSettled {
    pub family: FamilyName,
    pub loan_id: LoanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentRejected {
    pub family: FamilyName,
    pub loan_id: LoanId,
    pub amount: Coins,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsSent {
    pub transfer: TransactionRecord,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsReceived {
    pub family: FamilyName,
    pub from: FamilyName,
    pub amount: Coins,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mined {
    pub family: FamilyName,
    pub transactions: usize,
    pub reward: Coins,
    pub new_balance: Coins,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NothingToMine {
    pub family: FamilyName,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEqualized {
    pub family: FamilyName,
    pub delta: Coins,
    pub new_balance: Coins,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FamilyEvent {
    AllowanceSet(AllowanceSet),
    AllowancePaid(AllowancePaid),
    AllowanceDeferred(AllowanceDeferred),
    AllowanceUndeliverable(AllowanceUndeliverable),
    LoanApproved(LoanApproved),
    LoanDenied(LoanDenied),
    LoanRepaid(LoanRepaid),
    LoanSettled(LoanSettled),
    RepaymentRejected(RepaymentRejected),
    FundsSent(FundsSent),
    FundsReceived(FundsReceived),
    Mined(Mined),
    NothingToMine(NothingToMine),
    BalanceEqualized(BalanceEqualized),
}

impl Event for FamilyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FamilyEvent::AllowanceSet(_) => "ledger.family.allowance_set",
            FamilyEvent::AllowancePaid(_) => "ledger.family.allowance_paid",
            FamilyEvent::AllowanceDeferred(_) => "ledger.family.allowance_deferred",
            FamilyEvent::AllowanceUndeliverable(_) => "ledger.family.allowance_undeliverable",
            FamilyEvent::LoanApproved(_) => "ledger.family.loan_approved",
            FamilyEvent::LoanDenied(_) => "ledger.family.loan_denied",
            FamilyEvent::LoanRepaid(_) => "ledger.family.loan_repaid",
            FamilyEvent::LoanSettled(_) => "ledger.family.loan_settled",
            FamilyEvent::RepaymentRejected(_) => "ledger.family.repayment_rejected",
            FamilyEvent::FundsSent(_) => "ledger.family.funds_sent",
            FamilyEvent::FundsReceived(_) => "ledger.family.funds_received",
            FamilyEvent::Mined(_) => "ledger.family.mined",
            FamilyEvent::NothingToMine(_) => "ledger.family.nothing_to_mine",
            FamilyEvent::BalanceEqualized(_) => "ledger.family.balance_equalized",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FamilyEvent::AllowanceSet(e) => e.occurred_at,
            FamilyEvent::AllowancePaid(e) => e.occurred_at,
            FamilyEvent::AllowanceDeferred(e) => e.occurred_at,
            FamilyEvent::AllowanceUndeliverable(e) => e.occurred_at,
            FamilyEvent::LoanApproved(e) => e.occurred_at,
            FamilyEvent::LoanDenied(e) => e.occurred_at,
            FamilyEvent::LoanRepaid(e) => e.occurred_at,
            FamilyEvent::LoanSettled(e) => e.occurred_at,
            FamilyEvent::RepaymentRejected(e) => e.occurred_at,
            FamilyEvent::FundsSent(e) => e.occurred_at,
            FamilyEvent::FundsReceived(e) => e.occurred_at,
            FamilyEvent::Mined(e) => e.occurred_at,
            FamilyEvent::NothingToMine(e) => e.occurred_at,
            FamilyEvent::BalanceEqualized(e) => e.occurred_at,
        }
    }

    fn is_rejection(&self) -> bool {
        matches!(
            self,
            FamilyEvent::AllowanceDeferred(_)
                | FamilyEvent::AllowanceUndeliverable(_)
                | FamilyEvent::LoanDenied(_)
                | FamilyEvent::RepaymentRejected(_)
        )
    }
}

impl core::fmt::Display for FamilyEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FamilyEvent::AllowanceSet(e) => write!(
                f,
                "{} set allowance for {}: {} every {} milliseconds",
                e.family, e.recipient, e.amount, e.interval_ms
            ),
            FamilyEvent::AllowancePaid(e) => write!(
                f,
                "{} paid allowance of {} to {}",
                e.transfer.from, e.transfer.amount, e.transfer.to
            ),
            FamilyEvent::AllowanceDeferred(e) => write!(
                f,
                "{} cannot cover allowance of {} to {} (balance {})",
                e.family, e.amount, e.recipient, e.balance
            ),
            FamilyEvent::AllowanceUndeliverable(e) => write!(
                f,
                "{} cannot pay allowance of {} to {}: recipient is not registered",
                e.family, e.amount, e.recipient
            ),
            FamilyEvent::LoanApproved(e) => write!(
                f,
                "Loan approved for {}: {} for {} days",
                e.family, e.amount, e.duration_days
            ),
            FamilyEvent::LoanDenied(e) => write!(
                f,
                "Loan request denied for {}: insufficient collateral",
                e.family
            ),
            FamilyEvent::LoanRepaid(e) => write!(
                f,
                "{} repaid {} for loan {}. Remaining: {}",
                e.family, e.amount, e.loan_id, e.remaining
            ),
            FamilyEvent::LoanSettled(e) => write!(f, "Loan {} fully repaid", e.loan_id),
            FamilyEvent::RepaymentRejected(e) => {
                write!(f, "Invalid loan ID for {}: {}", e.family, e.loan_id)
            }
            FamilyEvent::FundsSent(e) => write!(
                f,
                "{} sent {} to {}",
                e.transfer.from, e.transfer.amount, e.transfer.to
            ),
            FamilyEvent::FundsReceived(e) => {
                write!(f, "{} received {} from {}", e.family, e.amount, e.from)
            }
            FamilyEvent::Mined(e) => write!(
                f,
                "{} mined {} coins from {} transactions. New balance: {}",
                e.family, e.reward, e.transactions, e.new_balance
            ),
            FamilyEvent::NothingToMine(e) => {
                write!(f, "{} has no transactions to mine.", e.family)
            }
            FamilyEvent::BalanceEqualized(e) => write!(
                f,
                "{}'s balance adjusted by {}. New balance: {}",
                e.family, e.delta, e.new_balance
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Family {
    type Command = FamilyCommand;
    type Event = FamilyEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            FamilyEvent::AllowanceSet(e) => {
                let allowance = Allowance {
                    recipient: e.recipient.clone(),
                    amount: e.amount,
                    interval: Duration::milliseconds(e.interval_ms),
                    last_paid: e.occurred_at,
                };
                match self.allowances.iter_mut().find(|a| a.recipient == e.recipient) {
                    Some(existing) => *existing = allowance,
                    None => self.allowances.push(allowance),
                }
            }
            FamilyEvent::AllowancePaid(e) => {
                self.balance -= e.transfer.amount;
                self.transaction_pool.push(e.transfer.clone());
                if let Some(a) = self.allowances.iter_mut().find(|a| a.recipient == e.transfer.to) {
                    a.last_paid = e.occurred_at;
                }
            }
            FamilyEvent::LoanApproved(e) => {
                self.balance += e.amount;
                self.loans.push(Loan {
                    id: e.loan_id.clone(),
                    amount: e.amount,
                    duration_days: e.duration_days,
                    remaining: e.amount,
                });
            }
            FamilyEvent::LoanRepaid(e) => {
                self.balance -= e.amount;
                if let Some(loan) = self.loans.iter_mut().find(|l| l.id == e.loan_id) {
                    loan.remaining = e.remaining;
                }
            }
            FamilyEvent::LoanSettled(e) => {
                self.loans.retain(|l| l.id != e.loan_id);
            }
            FamilyEvent::FundsSent(e) => {
                self.balance -= e.transfer.amount;
                self.transaction_pool.push(e.transfer.clone());
            }
            FamilyEvent::FundsReceived(e) => {
                self.balance += e.amount;
            }
            FamilyEvent::Mined(e) => {
                self.balance += e.reward;
                self.transaction_pool.clear();
            }
            FamilyEvent::BalanceEqualized(e) => {
                self.balance += e.delta;
            }
            FamilyEvent::AllowanceDeferred(_)
            | FamilyEvent::AllowanceUndeliverable(_)
            | FamilyEvent::LoanDenied(_)
            | FamilyEvent::RepaymentRejected(_)
            | FamilyEvent::NothingToMine(_) => {}
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            FamilyCommand::SetAllowance(cmd) => Ok(self.handle_set_allowance(cmd)),
            FamilyCommand::PayAllowances(cmd) => Ok(self.handle_pay_allowances(cmd)),
            FamilyCommand::RequestLoan(cmd) => Ok(self.handle_request_loan(cmd)),
            FamilyCommand::RepayLoan(cmd) => Ok(self.handle_repay_loan(cmd)),
            FamilyCommand::SendFunds(cmd) => self.handle_send(cmd),
            FamilyCommand::ReceiveFunds(cmd) => Ok(self.handle_receive(cmd)),
            FamilyCommand::Mine(cmd) => Ok(self.handle_mine(cmd)),
            FamilyCommand::EqualizeBalance(cmd) => Ok(self.handle_equalize(cmd)),
        }
    }
}

impl Family {
    fn handle_set_allowance(&self, cmd: &SetAllowance) -> Vec<FamilyEvent> {
        vec![FamilyEvent::AllowanceSet(AllowanceSet {
            family: self.name.clone(),
            recipient: cmd.recipient.clone(),
            amount: cmd.amount,
            interval_ms: cmd.interval.num_milliseconds(),
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_pay_allowances(&self, cmd: &PayAllowances) -> Vec<FamilyEvent> {
        let mut available = self.balance;
        let mut events = Vec::new();

        for allowance in self.allowances.iter().filter(|a| a.is_due(cmd.occurred_at)) {
            if cmd.undeliverable.contains(&allowance.recipient) {
                events.push(FamilyEvent::AllowanceUndeliverable(AllowanceUndeliverable {
                    family: self.name.clone(),
                    recipient: allowance.recipient.clone(),
                    amount: allowance.amount,
                    occurred_at: cmd.occurred_at,
                }));
                continue;
            }
            if available < allowance.amount {
                events.push(FamilyEvent::AllowanceDeferred(AllowanceDeferred {
                    family: self.name.clone(),
                    recipient: allowance.recipient.clone(),
                    amount: allowance.amount,
                    balance: available,
                    occurred_at: cmd.occurred_at,
                }));
                continue;
            }
            available -= allowance.amount;
            events.push(FamilyEvent::AllowancePaid(AllowancePaid {
                transfer: TransactionRecord::new(
                    self.name.clone(),
                    allowance.recipient.clone(),
                    allowance.amount,
                ),
                occurred_at: cmd.occurred_at,
            }));
        }

        events
    }

    fn handle_request_loan(&self, cmd: &RequestLoan) -> Vec<FamilyEvent> {
        if !self.policy.covers_collateral(self.balance, cmd.amount) {
            return vec![FamilyEvent::LoanDenied(LoanDenied {
                family: self.name.clone(),
                amount: cmd.amount,
                duration_days: cmd.duration_days,
                balance: self.balance,
                occurred_at: cmd.occurred_at,
            })];
        }
        vec![FamilyEvent::LoanApproved(LoanApproved {
            family: self.name.clone(),
            loan_id: cmd.loan_id.clone(),
            amount: cmd.amount,
            duration_days: cmd.duration_days,
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_repay_loan(&self, cmd: &RepayLoan) -> Vec<FamilyEvent> {
        let Some(loan) = self.loan(&cmd.loan_id) else {
            return vec![FamilyEvent::RepaymentRejected(RepaymentRejected {
                family: self.name.clone(),
                loan_id: cmd.loan_id.clone(),
                amount: cmd.amount,
                occurred_at: cmd.occurred_at,
            })];
        };

        let remaining = loan.remaining - cmd.amount;
        let mut events = vec![FamilyEvent::LoanRepaid(LoanRepaid {
            family: self.name.clone(),
            loan_id: cmd.loan_id.clone(),
            amount: cmd.amount,
            remaining,
            occurred_at: cmd.occurred_at,
        })];
        if remaining <= Coins::ZERO {
            events.push(FamilyEvent::LoanSettled(LoanSettled {
                family: self.name.clone(),
                loan_id: cmd.loan_id.clone(),
                occurred_at: cmd.occurred_at,
            }));
        }
        events
    }

    fn handle_send(&self, cmd: &SendFunds) -> Result<Vec<FamilyEvent>, LedgerError> {
        if !self.verify_two_factor(&cmd.code) {
            return Err(LedgerError::InvalidTwoFactor);
        }
        if cmd.to == self.name {
            return Err(LedgerError::SelfTransfer(self.name.clone()));
        }
        if self.balance < cmd.amount {
            return Err(LedgerError::InsufficientBalance {
                balance: self.balance,
                amount: cmd.amount,
            });
        }
        Ok(vec![FamilyEvent::FundsSent(FundsSent {
            transfer: TransactionRecord::new(self.name.clone(), cmd.to.clone(), cmd.amount),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveFunds) -> Vec<FamilyEvent> {
        vec![FamilyEvent::FundsReceived(FundsReceived {
            family: self.name.clone(),
            from: cmd.from.clone(),
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_mine(&self, cmd: &Mine) -> Vec<FamilyEvent> {
        if self.transaction_pool.is_empty() {
            return vec![FamilyEvent::NothingToMine(NothingToMine {
                family: self.name.clone(),
                occurred_at: cmd.occurred_at,
            })];
        }
        let transactions = self.transaction_pool.len();
        let reward = self.policy.mining_reward(transactions);
        vec![FamilyEvent::Mined(Mined {
            family: self.name.clone(),
            transactions,
            reward,
            new_balance: self.balance + reward,
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_equalize(&self, cmd: &EqualizeBalance) -> Vec<FamilyEvent> {
        vec![FamilyEvent::BalanceEqualized(BalanceEqualized {
            family: self.name.clone(),
            delta: cmd.target - self.balance,
            new_balance: cmd.target,
            occurred_at: cmd.occurred_at,
        })]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operations
// ─────────────────────────────────────────────────────────────────────────────

impl Family {
    /// Define a recurring payment to `recipient`, replacing any previous one.
    /// The first payment falls due one `interval` after `now`.
    pub fn set_allowance<S>(
        &mut self,
        recipient: &FamilyName,
        amount: Coins,
        interval: Duration,
        now: DateTime<Utc>,
        sink: &mut S,
    ) where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let events = self.handle_set_allowance(&SetAllowance {
            recipient: recipient.clone(),
            amount,
            interval,
            occurred_at: now,
        });
        commit(self, &events, sink);
    }

    /// Debit every due allowance and return the transfers made.
    ///
    /// Only the sender side happens here. [`Network::process_allowances`]
    /// credits each returned transfer and names the recipients it cannot
    /// reach in `undeliverable`.
    ///
    /// [`Network::process_allowances`]: crate::Network::process_allowances
    pub(crate) fn pay_allowances<S>(
        &mut self,
        now: DateTime<Utc>,
        undeliverable: &[FamilyName],
        sink: &mut S,
    ) -> Vec<TransactionRecord>
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let events = self.handle_pay_allowances(&PayAllowances {
            undeliverable: undeliverable.to_vec(),
            occurred_at: now,
        });
        commit(self, &events, sink);
        events
            .into_iter()
            .filter_map(|e| match e {
                FamilyEvent::AllowancePaid(paid) => Some(paid.transfer),
                _ => None,
            })
            .collect()
    }

    /// Returns the new loan's id when approved, `None` when denied.
    pub fn request_loan<S>(
        &mut self,
        amount: Coins,
        duration_days: u32,
        now: DateTime<Utc>,
        sink: &mut S,
    ) -> Option<LoanId>
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let events = self.handle_request_loan(&RequestLoan {
            loan_id: LoanId::generate(),
            amount,
            duration_days,
            occurred_at: now,
        });
        commit(self, &events, sink);
        events.into_iter().find_map(|e| match e {
            FamilyEvent::LoanApproved(approved) => Some(approved.loan_id),
            _ => None,
        })
    }

    /// Returns the remaining obligation, or `None` for an unknown loan id.
    pub fn repay_loan<S>(
        &mut self,
        loan_id: &LoanId,
        amount: Coins,
        now: DateTime<Utc>,
        sink: &mut S,
    ) -> Option<Coins>
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let events = self.handle_repay_loan(&RepayLoan {
            loan_id: loan_id.clone(),
            amount,
            occurred_at: now,
        });
        commit(self, &events, sink);
        events.into_iter().find_map(|e| match e {
            FamilyEvent::LoanRepaid(repaid) => Some(repaid.remaining),
            _ => None,
        })
    }

    /// Send `amount` to `recipient`. Fails without any change when the code
    /// does not verify or the balance is short.
    pub fn transact<S>(
        &mut self,
        recipient: &mut Family,
        amount: Coins,
        code: &str,
        now: DateTime<Utc>,
        sink: &mut S,
    ) -> Result<TransactionRecord, LedgerError>
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let command = FamilyCommand::SendFunds(SendFunds {
            to: recipient.name.clone(),
            amount,
            code: code.to_string(),
            occurred_at: now,
        });
        execute(self, &command, sink)?;
        recipient.receive_funds(&self.name, amount, now, sink);
        Ok(TransactionRecord::new(self.name.clone(), recipient.name.clone(), amount))
    }

    /// Credit side of a transfer.
    pub(crate) fn receive_funds<S>(&mut self, from: &FamilyName, amount: Coins, now: DateTime<Utc>, sink: &mut S)
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let events = self.handle_receive(&ReceiveFunds {
            from: from.clone(),
            amount,
            occurred_at: now,
        });
        commit(self, &events, sink);
    }

    /// Turn the pool into a reward. Returns the reward (zero for an empty pool).
    pub fn mine<S>(&mut self, now: DateTime<Utc>, sink: &mut S) -> Coins
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let events = self.handle_mine(&Mine { occurred_at: now });
        commit(self, &events, sink);
        events
            .iter()
            .map(|e| match e {
                FamilyEvent::Mined(mined) => mined.reward,
                _ => Coins::ZERO,
            })
            .sum()
    }

    /// Set the balance to `target`; returns the delta applied.
    pub fn equalize_to<S>(&mut self, target: Coins, now: DateTime<Utc>, sink: &mut S) -> Coins
    where
        S: EventSink<FamilyEvent> + ?Sized,
    {
        let delta = target - self.balance;
        let events = self.handle_equalize(&EqualizeBalance {
            target,
            occurred_at: now,
        });
        commit(self, &events, sink);
        delta
    }
}
