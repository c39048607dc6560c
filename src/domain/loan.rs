use super::money::Balance;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    Daily,
    Weekly,
    Monthly,
    /// Full cash purchase, settled in one go.
    OneTime,
}

impl PaymentFrequency {
    /// Length of one billing cycle in days. `None` for one-time sales.
    pub fn cycle_days(&self) -> Option<i64> {
        match self {
            PaymentFrequency::Daily => Some(1),
            PaymentFrequency::Weekly => Some(7),
            PaymentFrequency::Monthly => Some(30),
            PaymentFrequency::OneTime => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Completed,
    Paused,
    Overdue,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Completed => "completed",
            LoanStatus::Paused => "paused",
            LoanStatus::Overdue => "overdue",
        }
    }
}

/// How long the code issued by a settlement keeps the device running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Permanent,
    Days(i64),
}

/// A device financing agreement.
///
/// `balance == total_amount - amount_paid` holds after every mutation, and the loan is
/// `Completed` exactly when the balance is no longer positive.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Loan {
    pub id: Uuid,
    pub business_id: Uuid,
    pub customer_id: Uuid,
    pub device_id: Uuid,
    pub total_amount: Balance,
    pub amount_paid: Balance,
    pub balance: Balance,
    pub payment_frequency: PaymentFrequency,
    /// Recurring charge per cycle. Unused for one-time sales.
    pub payment_cycle_amount: Decimal,
    pub current_cycle_accumulated_payment: Balance,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn new(
        business_id: Uuid,
        customer_id: Uuid,
        device_id: Uuid,
        total_amount: Decimal,
        payment_frequency: PaymentFrequency,
        payment_cycle_amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            customer_id,
            device_id,
            total_amount: Balance::new(total_amount),
            amount_paid: Balance::ZERO,
            balance: Balance::new(total_amount),
            payment_frequency,
            payment_cycle_amount,
            current_cycle_accumulated_payment: Balance::ZERO,
            next_payment_date: None,
            status: LoanStatus::Active,
            paused_at: None,
        }
    }

    pub fn is_one_time(&self) -> bool {
        self.payment_frequency == PaymentFrequency::OneTime
    }

    /// The configured cycle amount, rejecting loans that cannot be bucketed.
    pub fn cycle_amount(&self) -> Result<Decimal> {
        if self.payment_cycle_amount > Decimal::ZERO {
            Ok(self.payment_cycle_amount)
        } else {
            Err(PaymentError::ConfigurationError(format!(
                "loan {} has no positive payment_cycle_amount",
                self.id
            )))
        }
    }

    /// True while nothing has been paid or accumulated on this loan.
    pub fn is_initial_payment(&self) -> bool {
        !self.amount_paid.is_positive() && !self.current_cycle_accumulated_payment.is_positive()
    }

    /// Books a settled amount and moves the loan to its next state.
    ///
    /// A paused loan is resumed at `now` first, so the pause still shifts the due date.
    pub fn apply_settlement(&mut self, amount: Decimal, validity: Validity, now: DateTime<Utc>) {
        if self.status == LoanStatus::Paused {
            self.end_pause(now);
        }
        let amount = Balance::new(amount);
        self.amount_paid += amount;
        self.balance = self.total_amount - self.amount_paid;

        match validity {
            Validity::Permanent => {
                self.status = LoanStatus::Completed;
                self.next_payment_date = None;
            }
            Validity::Days(days) => {
                let from = match self.next_payment_date {
                    Some(next) if next > now => next,
                    _ => now,
                };
                self.next_payment_date = Some(from + Duration::days(days));
                self.status = if self.balance.is_positive() {
                    LoanStatus::Active
                } else {
                    LoanStatus::Completed
                };
            }
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status == LoanStatus::Completed || self.status == LoanStatus::Paused {
            return Err(PaymentError::ValidationError(format!(
                "cannot pause a {} loan",
                self.status.as_str()
            )));
        }
        self.status = LoanStatus::Paused;
        self.paused_at = Some(now);
        Ok(())
    }

    /// Resumes a paused loan, pushing the due date out by the time spent paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != LoanStatus::Paused || self.paused_at.is_none() {
            return Err(PaymentError::ValidationError(
                "loan is not paused".to_string(),
            ));
        }
        self.end_pause(now);
        Ok(())
    }

    fn end_pause(&mut self, now: DateTime<Utc>) {
        if let (Some(paused_at), Some(next)) = (self.paused_at.take(), self.next_payment_date) {
            self.next_payment_date = Some(next + (now - paused_at));
        }
        self.status = LoanStatus::Active;
    }

    /// Flags an active loan whose due date has passed. Returns whether it changed.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> bool {
        match self.next_payment_date {
            Some(next) if self.status == LoanStatus::Active && next < now => {
                self.status = LoanStatus::Overdue;
                true
            }
            _ => false,
        }
    }
}
