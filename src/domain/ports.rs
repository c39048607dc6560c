use super::device::{Device, DeviceType};
use super::loan::Loan;
use super::party::{Agent, Business};
use super::payment::{Commission, Payment, SuperAgentCommission, Token};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Opens units of work against the persistent state.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    /// Committed loans, for reporting and scheduled sweeps. Takes no locks.
    async fn all_loans(&self) -> Result<Vec<Loan>>;
}

/// One database transaction on the settlement path.
///
/// `lock_*` and `find_payment` hold the corresponding row until the unit of work is
/// committed or dropped. Writes stay invisible to other units until `commit`;
/// dropping without committing discards them.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn lock_loan(&mut self, loan_id: Uuid) -> Result<Loan>;
    async fn lock_device(&mut self, device_id: Uuid) -> Result<Device>;
    async fn lock_agent(&mut self, agent_id: Uuid) -> Result<Agent>;
    async fn device_type(&mut self, device_type_id: Uuid) -> Result<DeviceType>;
    async fn business(&mut self, business_id: Uuid) -> Result<Business>;

    /// Looks up a payment by its provider reference, locking the reference.
    async fn find_payment(
        &mut self,
        business_id: Uuid,
        transaction_id: &str,
    ) -> Result<Option<Payment>>;

    async fn insert_payment(&mut self, payment: Payment) -> Result<()>;
    async fn insert_token(&mut self, token: Token) -> Result<()>;
    async fn insert_commission(&mut self, commission: Commission) -> Result<()>;
    async fn insert_super_agent_commission(
        &mut self,
        commission: SuperAgentCommission,
    ) -> Result<()>;

    async fn save_loan(&mut self, loan: Loan) -> Result<()>;
    async fn save_device(&mut self, device: Device) -> Result<()>;
    async fn save_agent(&mut self, agent: Agent) -> Result<()>;
    async fn save_business(&mut self, business: Business) -> Result<()>;
    async fn save_device_type(&mut self, device_type: DeviceType) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Customer-facing message emitted after a payment is committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    CodeIssued {
        customer_id: Uuid,
        loan_id: Uuid,
        amount_paid: Decimal,
        balance: Decimal,
        code: String,
        expires_at: Option<DateTime<Utc>>,
    },
    PaymentShortfall {
        customer_id: Uuid,
        loan_id: Uuid,
        amount_paid: Decimal,
        remaining: Decimal,
    },
}

/// Delivery channel for [`Notice`]s. Failures never affect settlement state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: Notice) -> Result<()>;
}
