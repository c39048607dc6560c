use super::commission::{self, CommissionBasis, CommissionSplit};
use crate::domain::loan::{Loan, PaymentFrequency, Validity};
use crate::domain::money::Balance;
use crate::domain::payment::Token;
use crate::domain::ports::UnitOfWork;
use crate::error::{PaymentError, Result};
use crate::manufacturer::ManufacturerAdapters;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

/// One settlement on the orchestrator's critical path.
#[derive(Debug, Clone)]
pub struct SettleRequest {
    pub business_id: Uuid,
    pub loan_id: Uuid,
    pub user_id: Uuid,
    pub payment_id: Uuid,
    /// Whole cycles being finalised now.
    pub settle_amount: Decimal,
    /// What the customer actually paid, including any remainder carried forward.
    pub full_amount: Decimal,
    pub is_initial_payment: bool,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Settlement {
    pub token: Token,
    pub validity: Validity,
    pub loan: Loan,
    pub commission: Option<CommissionSplit>,
    /// Which issuer produced the code.
    pub issuer: &'static str,
    pub remote_issuer: bool,
}

/// Number of days (or a permanent unlock) bought by `settle_amount`.
pub fn validity_for(
    loan: &Loan,
    settle_amount: Decimal,
    new_balance: Balance,
    is_initial_payment: bool,
    token_validity_days: Option<i64>,
) -> Result<Validity> {
    if !new_balance.is_positive() {
        return Ok(Validity::Permanent);
    }
    let cycle_days = loan.payment_frequency.cycle_days().ok_or_else(|| {
        PaymentError::ValidationError(format!(
            "one-time sale on loan {} must be paid in full",
            loan.id
        ))
    })?;

    if is_initial_payment
        && let Some(days) = token_validity_days.filter(|d| *d > 0)
    {
        return Ok(Validity::Days(days));
    }

    let cycle_amount = loan.cycle_amount()?;
    if settle_amount >= cycle_amount {
        // cycle_days + (settle - cycle) / cycle * cycle_days, multiplied out to stay exact
        let days = (Decimal::from(cycle_days) * settle_amount / cycle_amount)
            .floor()
            .to_i64()
            .ok_or_else(|| PaymentError::ValidationError("validity overflow".to_string()))?;
        Ok(Validity::Days(days))
    } else {
        Ok(Validity::Days(cycle_days))
    }
}

/// Coordinates code issuance, commission and loan booking inside one unit of work.
#[derive(Clone)]
pub struct SettlementOrchestrator {
    adapters: ManufacturerAdapters,
}

impl SettlementOrchestrator {
    pub fn new(adapters: ManufacturerAdapters) -> Self {
        Self { adapters }
    }

    /// Settles `request.settle_amount` against the loan.
    ///
    /// Everything is staged in `uow`; nothing is visible until the caller commits.
    /// Any error leaves the caller to drop the unit of work, discarding the staged
    /// counter increment along with everything else. A code already issued by a
    /// remote manufacturer cannot be recalled.
    pub async fn settle(&self, uow: &mut dyn UnitOfWork, request: &SettleRequest) -> Result<Settlement> {
        if request.settle_amount <= Decimal::ZERO {
            return Err(PaymentError::ValidationError(
                "settle amount must be positive".to_string(),
            ));
        }
        let mut loan = uow.lock_loan(request.loan_id).await?;
        if loan.business_id != request.business_id {
            return Err(PaymentError::not_found("loan", request.loan_id));
        }
        let business = uow.business(request.business_id).await?;
        let mut device = uow.lock_device(loan.device_id).await?;
        let device_type = uow.device_type(device.device_type_id).await?;

        let new_balance = loan.balance - Balance::new(request.settle_amount);
        let validity = validity_for(
            &loan,
            request.settle_amount,
            new_balance,
            request.is_initial_payment,
            business.token_validity_days,
        )?;

        let issuer = self.adapters.for_device(&device)?;
        let code = issuer.issue_code(&mut device, &business, validity).await?;
        tracing::info!(
            loan = %loan.id,
            serial = %device.serial_number,
            issuer = issuer.name(),
            ?validity,
            "unlock code issued"
        );

        loan.apply_settlement(request.settle_amount, validity, request.now);

        let token = Token {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            payment_id: request.payment_id,
            code,
            expires_at: match validity {
                Validity::Permanent => None,
                Validity::Days(_) => loan.next_payment_date,
            },
        };
        uow.insert_token(token.clone()).await?;

        let basis = CommissionBasis::for_sale(
            loan.payment_frequency == PaymentFrequency::OneTime,
            request.settle_amount,
            loan.total_amount.value(),
            &device_type,
        );
        let commission =
            commission::record(uow, &mut device, &business, basis, request.payment_id).await?;

        uow.save_device(device).await?;
        uow.save_loan(loan.clone()).await?;

        tracing::info!(
            loan = %loan.id,
            settled = %request.settle_amount,
            paid = %request.full_amount,
            balance = %loan.balance,
            status = loan.status.as_str(),
            "loan settled"
        );

        Ok(Settlement {
            token,
            validity,
            loan,
            commission,
            issuer: issuer.name(),
            remote_issuer: issuer.is_remote(),
        })
    }
}
