use crate::domain::loan::Loan;
use crate::error::Result;
use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct LoanRow {
    loan: Uuid,
    amount_paid: String,
    balance: String,
    accumulated: String,
    status: &'static str,
    next_payment_date: String,
}

impl From<&Loan> for LoanRow {
    fn from(loan: &Loan) -> Self {
        LoanRow {
            loan: loan.id,
            amount_paid: loan.amount_paid.to_string(),
            balance: loan.balance.to_string(),
            accumulated: loan.current_cycle_accumulated_payment.to_string(),
            status: loan.status.as_str(),
            next_payment_date: loan
                .next_payment_date
                .map(|date| date.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
        }
    }
}

/// Writes the final state of each loan as CSV.
pub struct LoanWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LoanWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one row per loan, ordered by loan id so output is stable.
    pub fn write_loans(&mut self, mut loans: Vec<Loan>) -> Result<()> {
        loans.sort_by_key(|loan| loan.id);
        for loan in &loans {
            self.writer.serialize(LoanRow::from(loan))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
