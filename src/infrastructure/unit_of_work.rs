use super::locks::{LockTable, RowGuard};
use crate::domain::device::{Device, DeviceType};
use crate::domain::loan::Loan;
use crate::domain::party::{Agent, Business};
use crate::domain::payment::{Commission, Payment, SuperAgentCommission, Token};
use crate::domain::ports::{SettlementStore, UnitOfWork};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// Writes staged by one unit of work, applied atomically on commit.
#[derive(Debug, Default, Clone)]
pub struct Changeset {
    pub loans: HashMap<Uuid, Loan>,
    pub devices: HashMap<Uuid, Device>,
    pub agents: HashMap<Uuid, Agent>,
    pub businesses: HashMap<Uuid, Business>,
    pub device_types: HashMap<Uuid, DeviceType>,
    pub payments: Vec<Payment>,
    pub tokens: Vec<Token>,
    pub commissions: Vec<Commission>,
    pub super_agent_commissions: Vec<SuperAgentCommission>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
            && self.devices.is_empty()
            && self.agents.is_empty()
            && self.businesses.is_empty()
            && self.device_types.is_empty()
            && self.payments.is_empty()
            && self.tokens.is_empty()
            && self.commissions.is_empty()
            && self.super_agent_commissions.is_empty()
    }
}

/// Committed-state access for a concrete storage engine.
///
/// Implementors only read and apply; row locking and staging live in
/// [`StagedUnitOfWork`], and every `Backend` is a [`SettlementStore`].
#[async_trait]
pub trait Backend: Clone + Send + Sync + 'static {
    fn locks(&self) -> &LockTable;

    async fn get_loan(&self, id: Uuid) -> Result<Option<Loan>>;
    async fn get_device(&self, id: Uuid) -> Result<Option<Device>>;
    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>>;
    async fn get_business(&self, id: Uuid) -> Result<Option<Business>>;
    async fn get_device_type(&self, id: Uuid) -> Result<Option<DeviceType>>;
    async fn get_payment(
        &self,
        business_id: Uuid,
        transaction_id: &str,
    ) -> Result<Option<Payment>>;
    async fn get_loans(&self) -> Result<Vec<Loan>>;

    async fn apply(&self, changes: Changeset) -> Result<()>;
}

#[async_trait]
impl<B: Backend> SettlementStore for B {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(StagedUnitOfWork::new(self.clone())))
    }

    async fn all_loans(&self) -> Result<Vec<Loan>> {
        self.get_loans().await
    }
}

/// Pessimistic unit of work over a [`Backend`].
///
/// Locks are reentrant within one unit and released when it is committed, rolled
/// back or dropped. Reads see this unit's own staged writes first.
pub struct StagedUnitOfWork<B: Backend> {
    backend: B,
    guards: HashMap<String, RowGuard>,
    changes: Changeset,
}

impl<B: Backend> StagedUnitOfWork<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            guards: HashMap::new(),
            changes: Changeset::default(),
        }
    }

    async fn lock(&mut self, key: String) {
        if !self.guards.contains_key(&key) {
            let guard = self.backend.locks().acquire(&key).await;
            self.guards.insert(key, guard);
        }
    }

    fn staged_payment(&self, business_id: Uuid, transaction_id: &str) -> Option<&Payment> {
        self.changes
            .payments
            .iter()
            .find(|p| p.business_id == business_id && p.transaction_id == transaction_id)
    }
}

fn payment_key(business_id: Uuid, transaction_id: &str) -> String {
    format!("payment:{business_id}:{transaction_id}")
}

#[async_trait]
impl<B: Backend> UnitOfWork for StagedUnitOfWork<B> {
    async fn lock_loan(&mut self, loan_id: Uuid) -> Result<Loan> {
        self.lock(format!("loan:{loan_id}")).await;
        if let Some(loan) = self.changes.loans.get(&loan_id) {
            return Ok(loan.clone());
        }
        self.backend
            .get_loan(loan_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("loan", loan_id))
    }

    async fn lock_device(&mut self, device_id: Uuid) -> Result<Device> {
        self.lock(format!("device:{device_id}")).await;
        if let Some(device) = self.changes.devices.get(&device_id) {
            return Ok(device.clone());
        }
        self.backend
            .get_device(device_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("device", device_id))
    }

    async fn lock_agent(&mut self, agent_id: Uuid) -> Result<Agent> {
        self.lock(format!("agent:{agent_id}")).await;
        if let Some(agent) = self.changes.agents.get(&agent_id) {
            return Ok(agent.clone());
        }
        self.backend
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("agent", agent_id))
    }

    async fn device_type(&mut self, device_type_id: Uuid) -> Result<DeviceType> {
        if let Some(device_type) = self.changes.device_types.get(&device_type_id) {
            return Ok(device_type.clone());
        }
        self.backend
            .get_device_type(device_type_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("device type", device_type_id))
    }

    async fn business(&mut self, business_id: Uuid) -> Result<Business> {
        if let Some(business) = self.changes.businesses.get(&business_id) {
            return Ok(business.clone());
        }
        self.backend
            .get_business(business_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("business", business_id))
    }

    async fn find_payment(
        &mut self,
        business_id: Uuid,
        transaction_id: &str,
    ) -> Result<Option<Payment>> {
        self.lock(payment_key(business_id, transaction_id)).await;
        if let Some(payment) = self.staged_payment(business_id, transaction_id) {
            return Ok(Some(payment.clone()));
        }
        self.backend.get_payment(business_id, transaction_id).await
    }

    async fn insert_payment(&mut self, payment: Payment) -> Result<()> {
        let reference = payment.transaction_id.clone();
        if self.find_payment(payment.business_id, &reference).await?.is_some() {
            return Err(PaymentError::Conflict(format!(
                "payment reference {reference} already recorded"
            )));
        }
        self.changes.payments.push(payment);
        Ok(())
    }

    async fn insert_token(&mut self, token: Token) -> Result<()> {
        self.changes.tokens.push(token);
        Ok(())
    }

    async fn insert_commission(&mut self, commission: Commission) -> Result<()> {
        self.changes.commissions.push(commission);
        Ok(())
    }

    async fn insert_super_agent_commission(
        &mut self,
        commission: SuperAgentCommission,
    ) -> Result<()> {
        self.changes.super_agent_commissions.push(commission);
        Ok(())
    }

    async fn save_loan(&mut self, loan: Loan) -> Result<()> {
        self.lock(format!("loan:{}", loan.id)).await;
        self.changes.loans.insert(loan.id, loan);
        Ok(())
    }

    async fn save_device(&mut self, device: Device) -> Result<()> {
        self.lock(format!("device:{}", device.id)).await;
        self.changes.devices.insert(device.id, device);
        Ok(())
    }

    async fn save_agent(&mut self, agent: Agent) -> Result<()> {
        self.lock(format!("agent:{}", agent.id)).await;
        self.changes.agents.insert(agent.id, agent);
        Ok(())
    }

    async fn save_business(&mut self, business: Business) -> Result<()> {
        self.changes.businesses.insert(business.id, business);
        Ok(())
    }

    async fn save_device_type(&mut self, device_type: DeviceType) -> Result<()> {
        self.changes.device_types.insert(device_type.id, device_type);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        if !this.changes.is_empty() {
            this.backend.apply(this.changes).await?;
        }
        drop(this.guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!(locks = self.guards.len(), "unit of work rolled back");
        Ok(())
    }
}
