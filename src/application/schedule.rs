use crate::domain::loan::{Loan, LoanStatus};
use crate::domain::ports::SettlementStore;
use crate::error::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Flags every active loan whose due date has passed. Returns the flagged ids.
///
/// Each loan is re-read under its row lock, so a payment that lands between the
/// scan and the update wins.
pub async fn flag_overdue(store: &dyn SettlementStore, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
    let candidates: Vec<Uuid> = store
        .all_loans()
        .await?
        .into_iter()
        .filter(|loan| is_due(loan, now))
        .map(|loan| loan.id)
        .collect();

    let mut flagged = Vec::new();
    for loan_id in candidates {
        let mut uow = store.begin().await?;
        let mut loan = uow.lock_loan(loan_id).await?;
        if loan.mark_overdue(now) {
            uow.save_loan(loan).await?;
            uow.commit().await?;
            flagged.push(loan_id);
        }
    }
    if !flagged.is_empty() {
        tracing::info!(count = flagged.len(), "loans flagged overdue");
    }
    Ok(flagged)
}

/// Pauses a loan, freezing its due date until [`resume_loan`].
pub async fn pause_loan(store: &dyn SettlementStore, loan_id: Uuid, now: DateTime<Utc>) -> Result<Loan> {
    let mut uow = store.begin().await?;
    let mut loan = uow.lock_loan(loan_id).await?;
    loan.pause(now)?;
    uow.save_loan(loan.clone()).await?;
    uow.commit().await?;
    Ok(loan)
}

pub async fn resume_loan(store: &dyn SettlementStore, loan_id: Uuid, now: DateTime<Utc>) -> Result<Loan> {
    let mut uow = store.begin().await?;
    let mut loan = uow.lock_loan(loan_id).await?;
    loan.resume(now)?;
    uow.save_loan(loan.clone()).await?;
    uow.commit().await?;
    Ok(loan)
}

fn is_due(loan: &Loan, now: DateTime<Utc>) -> bool {
    loan.status == LoanStatus::Active && loan.next_payment_date.is_some_and(|next| next < now)
}
