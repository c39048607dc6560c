use super::ledger::{self, CycleOutcome};
use super::settlement::{SettleRequest, SettlementOrchestrator};
use super::webhook::{self, WebhookEvent};
use crate::domain::loan::{LoanStatus, Validity};
use crate::domain::money::{Amount, Balance};
use crate::domain::payment::{Payment, PaymentChannel};
use crate::domain::ports::{Notice, Notifier, SettlementStore, UnitOfWork};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use uuid::Uuid;

/// A successful payment waiting to be booked.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingPayment {
    pub business_id: Uuid,
    pub loan_id: Uuid,
    pub user_id: Uuid,
    pub amount: Amount,
    /// Provider or caller reference; unique per business.
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// The reference was already booked; nothing changed.
    Duplicate { payment_id: Uuid },
    /// Webhook event that does not move money.
    Ignored { event: String },
    /// Booked into the cycle accumulator without settling.
    Accumulated {
        payment_id: Uuid,
        accumulated: Balance,
        remaining: Decimal,
    },
    Settled {
        payment_id: Uuid,
        code: String,
        validity: Validity,
        settled_amount: Decimal,
        remainder: Balance,
        expires_at: Option<DateTime<Utc>>,
    },
}

/// Entry point for every way money reaches a loan.
///
/// Each payment runs in its own unit of work: the idempotency check, the payment
/// row, the cycle ledger and the settlement commit together or not at all.
/// Notifications go out after the commit and never affect the outcome.
#[derive(Clone)]
pub struct PaymentProcessor {
    store: Arc<dyn SettlementStore>,
    orchestrator: SettlementOrchestrator,
    notifier: Arc<dyn Notifier>,
    pending: Arc<Mutex<JoinSet<()>>>,
}

impl PaymentProcessor {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        orchestrator: SettlementOrchestrator,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            notifier,
            pending: Arc::default(),
        }
    }

    /// Waits for every notice dispatched so far to be delivered (or to fail).
    pub async fn flush_notices(&self) {
        let mut pending = std::mem::take(&mut *self.pending_set());
        while pending.join_next().await.is_some() {}
    }

    fn pending_set(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handles a provider webhook given its raw body and signature header.
    pub async fn process_webhook(&self, raw_body: &[u8], signature: &str) -> Result<PaymentOutcome> {
        let event = WebhookEvent::parse(raw_body)?;
        let business_id = event.data.metadata.business_id;

        let mut uow = self.store.begin().await?;
        let business = uow.business(business_id).await?;
        webhook::verify_signature(&business.webhook_secret, raw_body, signature)?;

        if !event.is_charge_success() {
            tracing::debug!(event = %event.event, "ignoring webhook event");
            return Ok(PaymentOutcome::Ignored { event: event.event });
        }

        let incoming = IncomingPayment {
            business_id,
            loan_id: event.data.metadata.loan_id,
            user_id: event.data.metadata.user_id,
            amount: event.amount()?,
            transaction_id: event.data.reference.clone(),
        };
        self.run(uow, incoming, PaymentChannel::Webhook, Utc::now()).await
    }

    /// Books a payment entered by staff.
    pub async fn record_manual_payment(&self, incoming: IncomingPayment) -> Result<PaymentOutcome> {
        self.record_manual_payment_at(incoming, Utc::now()).await
    }

    pub async fn record_manual_payment_at(
        &self,
        incoming: IncomingPayment,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        let uow = self.store.begin().await?;
        self.run(uow, incoming, PaymentChannel::Manual, now).await
    }

    /// Pays a customer's loan out of an agent's prepaid credit.
    pub async fn pay_with_agent_credit(
        &self,
        agent_id: Uuid,
        incoming: IncomingPayment,
    ) -> Result<PaymentOutcome> {
        let mut uow = self.store.begin().await?;
        if let Some(existing) = uow
            .find_payment(incoming.business_id, &incoming.transaction_id)
            .await?
        {
            return Ok(PaymentOutcome::Duplicate {
                payment_id: existing.id,
            });
        }
        // Same order as settlement: loan, device, then every agent row by id.
        let loan = uow.lock_loan(incoming.loan_id).await?;
        let device = uow.lock_device(loan.device_id).await?;
        let mut agent_ids: Vec<Uuid> =
            device.assigned_by.into_iter().chain([agent_id]).collect();
        agent_ids.sort();
        agent_ids.dedup();
        for id in agent_ids {
            uow.lock_agent(id).await?;
        }
        let mut agent = uow.lock_agent(agent_id).await?;
        if agent.business_id != incoming.business_id {
            return Err(PaymentError::not_found("agent", agent_id));
        }
        let requested = Balance::from(incoming.amount);
        if agent.credit_balance < requested {
            return Err(PaymentError::InsufficientCredit {
                requested: requested.value(),
                available: agent.credit_balance.value(),
            });
        }
        agent.credit_balance -= requested;
        uow.save_agent(agent).await?;

        self.run(uow, incoming, PaymentChannel::AgentCredit, Utc::now())
            .await
    }

    async fn run(
        &self,
        mut uow: Box<dyn UnitOfWork>,
        incoming: IncomingPayment,
        channel: PaymentChannel,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        let (outcome, notice, remote_code) =
            match self.book(uow.as_mut(), &incoming, channel, now).await {
                Ok(booked) => booked,
                Err(e) => {
                    uow.rollback().await?;
                    tracing::warn!(
                        reference = %incoming.transaction_id,
                        loan = %incoming.loan_id,
                        error = %e,
                        "payment rolled back"
                    );
                    return Err(e);
                }
            };

        if let Err(e) = uow.commit().await {
            if remote_code {
                tracing::error!(
                    reference = %incoming.transaction_id,
                    loan = %incoming.loan_id,
                    error = %e,
                    "commit failed after a remote manufacturer issued a code; reconcile manually"
                );
            }
            return Err(e);
        }

        if let Some(notice) = notice {
            self.dispatch(notice);
        }
        Ok(outcome)
    }

    async fn book(
        &self,
        uow: &mut dyn UnitOfWork,
        incoming: &IncomingPayment,
        channel: PaymentChannel,
        now: DateTime<Utc>,
    ) -> Result<(PaymentOutcome, Option<Notice>, bool)> {
        if let Some(existing) = uow
            .find_payment(incoming.business_id, &incoming.transaction_id)
            .await?
        {
            tracing::info!(reference = %incoming.transaction_id, "duplicate payment skipped");
            return Ok((
                PaymentOutcome::Duplicate {
                    payment_id: existing.id,
                },
                None,
                false,
            ));
        }

        let mut loan = uow.lock_loan(incoming.loan_id).await?;
        if loan.business_id != incoming.business_id {
            return Err(PaymentError::not_found("loan", incoming.loan_id));
        }
        if loan.status == LoanStatus::Completed {
            return Err(PaymentError::ValidationError(format!(
                "loan {} is already paid off",
                loan.id
            )));
        }
        let is_initial_payment = loan.is_initial_payment();

        let payment = Payment::new(
            incoming.business_id,
            incoming.loan_id,
            incoming.user_id,
            incoming.amount,
            incoming.transaction_id.clone(),
            channel,
            now,
        );
        let payment_id = payment.id;
        uow.insert_payment(payment).await?;
        tracing::info!(
            reference = %incoming.transaction_id,
            loan = %loan.id,
            amount = %incoming.amount,
            ?channel,
            "payment accepted"
        );

        let (settle_amount, remainder) = if loan.is_one_time() {
            (incoming.amount.value(), Balance::ZERO)
        } else {
            match ledger::accumulate(&mut loan, incoming.amount)? {
                CycleOutcome::Settle {
                    settle_amount,
                    remainder,
                    ..
                } => {
                    uow.save_loan(loan.clone()).await?;
                    (settle_amount, remainder)
                }
                CycleOutcome::Shortfall {
                    accumulated,
                    remaining,
                } => {
                    uow.save_loan(loan.clone()).await?;
                    let notice = Notice::PaymentShortfall {
                        customer_id: loan.customer_id,
                        loan_id: loan.id,
                        amount_paid: incoming.amount.value(),
                        remaining,
                    };
                    return Ok((
                        PaymentOutcome::Accumulated {
                            payment_id,
                            accumulated,
                            remaining,
                        },
                        Some(notice),
                        false,
                    ));
                }
            }
        };

        let settlement = self
            .orchestrator
            .settle(
                uow,
                &SettleRequest {
                    business_id: incoming.business_id,
                    loan_id: loan.id,
                    user_id: incoming.user_id,
                    payment_id,
                    settle_amount,
                    full_amount: incoming.amount.value(),
                    is_initial_payment,
                    now,
                },
            )
            .await?;

        let remote_code = settlement.remote_issuer;
        let notice = Notice::CodeIssued {
            customer_id: settlement.loan.customer_id,
            loan_id: settlement.loan.id,
            amount_paid: incoming.amount.value(),
            balance: settlement.loan.balance.value(),
            code: settlement.token.code.clone(),
            expires_at: settlement.token.expires_at,
        };
        Ok((
            PaymentOutcome::Settled {
                payment_id,
                code: settlement.token.code,
                validity: settlement.validity,
                settled_amount: settle_amount,
                remainder,
                expires_at: settlement.token.expires_at,
            },
            Some(notice),
            remote_code,
        ))
    }

    fn dispatch(&self, notice: Notice) {
        let notifier = Arc::clone(&self.notifier);
        let mut pending = self.pending_set();
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            if let Err(e) = notifier.notify(notice).await {
                tracing::warn!(error = %e, "notification failed");
            }
        });
    }
}
