use super::locks::LockTable;
use super::unit_of_work::{Backend, Changeset};
use crate::domain::device::{Device, DeviceType};
use crate::domain::loan::Loan;
use crate::domain::party::{Agent, Business};
use crate::domain::payment::{Commission, Payment, SuperAgentCommission, Token};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    loans: HashMap<Uuid, Loan>,
    devices: HashMap<Uuid, Device>,
    agents: HashMap<Uuid, Agent>,
    businesses: HashMap<Uuid, Business>,
    device_types: HashMap<Uuid, DeviceType>,
    payments: HashMap<(Uuid, String), Payment>,
    tokens: Vec<Token>,
    commissions: Vec<Commission>,
    super_agent_commissions: Vec<SuperAgentCommission>,
}

/// A thread-safe in-memory settlement store.
///
/// All tables sit behind one `RwLock`, so a commit is applied atomically.
/// Ideal for testing or for batch runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: LockTable,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn loan(&self, id: Uuid) -> Option<Loan> {
        self.tables.read().await.loans.get(&id).cloned()
    }

    pub async fn device(&self, id: Uuid) -> Option<Device> {
        self.tables.read().await.devices.get(&id).cloned()
    }

    pub async fn agent(&self, id: Uuid) -> Option<Agent> {
        self.tables.read().await.agents.get(&id).cloned()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.tables.read().await.payments.values().cloned().collect()
    }

    pub async fn tokens(&self) -> Vec<Token> {
        self.tables.read().await.tokens.clone()
    }

    pub async fn commissions(&self) -> Vec<Commission> {
        self.tables.read().await.commissions.clone()
    }

    pub async fn super_agent_commissions(&self) -> Vec<SuperAgentCommission> {
        self.tables.read().await.super_agent_commissions.clone()
    }
}

#[async_trait]
impl Backend for InMemoryStore {
    fn locks(&self) -> &LockTable {
        &self.locks
    }

    async fn get_loan(&self, id: Uuid) -> Result<Option<Loan>> {
        Ok(self.loan(id).await)
    }

    async fn get_device(&self, id: Uuid) -> Result<Option<Device>> {
        Ok(self.device(id).await)
    }

    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>> {
        Ok(self.agent(id).await)
    }

    async fn get_business(&self, id: Uuid) -> Result<Option<Business>> {
        let tables = self.tables.read().await;
        Ok(tables.businesses.get(&id).cloned())
    }

    async fn get_device_type(&self, id: Uuid) -> Result<Option<DeviceType>> {
        let tables = self.tables.read().await;
        Ok(tables.device_types.get(&id).cloned())
    }

    async fn get_payment(
        &self,
        business_id: Uuid,
        transaction_id: &str,
    ) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .get(&(business_id, transaction_id.to_string()))
            .cloned())
    }

    async fn get_loans(&self) -> Result<Vec<Loan>> {
        let tables = self.tables.read().await;
        Ok(tables.loans.values().cloned().collect())
    }

    async fn apply(&self, changes: Changeset) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.loans.extend(changes.loans);
        tables.devices.extend(changes.devices);
        tables.agents.extend(changes.agents);
        tables.businesses.extend(changes.businesses);
        tables.device_types.extend(changes.device_types);
        for payment in changes.payments {
            tables
                .payments
                .insert((payment.business_id, payment.transaction_id.clone()), payment);
        }
        tables.tokens.extend(changes.tokens);
        tables.commissions.extend(changes.commissions);
        tables
            .super_agent_commissions
            .extend(changes.super_agent_commissions);
        Ok(())
    }
}
