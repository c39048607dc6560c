//! Cycle ledger: turns arbitrary payment amounts into whole-cycle settlements.

use crate::domain::loan::{Loan, LoanStatus};
use crate::domain::money::{Amount, Balance};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// At least one cycle is covered; `settle_amount` goes to the orchestrator.
    Settle {
        settle_amount: Decimal,
        cycles: Decimal,
        remainder: Balance,
    },
    /// Not enough for a cycle yet; the money waits in the accumulator.
    Shortfall {
        accumulated: Balance,
        remaining: Decimal,
    },
}

/// Adds `amount` to the loan's cycle accumulator and decides what to settle.
///
/// The loan's `current_cycle_accumulated_payment` is updated in place (to the
/// carried remainder when settling). Balance, status and dates are left to the
/// settlement itself.
///
/// A payment that reaches the outstanding balance pays the loan off in one
/// settlement, even when the balance is smaller than a cycle.
pub fn accumulate(loan: &mut Loan, amount: Amount) -> Result<CycleOutcome> {
    if loan.status == LoanStatus::Completed {
        return Err(PaymentError::ValidationError(format!(
            "loan {} is already paid off",
            loan.id
        )));
    }
    if loan.is_one_time() {
        return Err(PaymentError::ValidationError(format!(
            "loan {} is a one-time sale and has no cycles",
            loan.id
        )));
    }
    let cycle_amount = loan.cycle_amount()?;
    let new_total = loan.current_cycle_accumulated_payment + Balance::from(amount);

    if loan.balance.is_positive() && new_total >= loan.balance {
        loan.current_cycle_accumulated_payment = Balance::ZERO;
        return Ok(CycleOutcome::Settle {
            settle_amount: new_total.value(),
            cycles: (new_total.value() / cycle_amount).floor(),
            remainder: Balance::ZERO,
        });
    }

    if new_total.value() >= cycle_amount {
        let cycles = (new_total.value() / cycle_amount).floor();
        let settle_amount = cycles * cycle_amount;
        let remainder = new_total - Balance::new(settle_amount);
        loan.current_cycle_accumulated_payment = remainder;
        Ok(CycleOutcome::Settle {
            settle_amount,
            cycles,
            remainder,
        })
    } else {
        loan.current_cycle_accumulated_payment = new_total;
        Ok(CycleOutcome::Shortfall {
            accumulated: new_total,
            remaining: cycle_amount - new_total.value(),
        })
    }
}
