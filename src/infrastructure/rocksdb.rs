use super::locks::LockTable;
use super::unit_of_work::{Backend, Changeset};
use crate::domain::device::{Device, DeviceType};
use crate::domain::loan::Loan;
use crate::domain::party::{Agent, Business};
use crate::domain::payment::Payment;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub const CF_LOANS: &str = "loans";
pub const CF_DEVICES: &str = "devices";
pub const CF_AGENTS: &str = "agents";
pub const CF_BUSINESSES: &str = "businesses";
pub const CF_DEVICE_TYPES: &str = "device_types";
/// Keyed by business id followed by the provider reference.
pub const CF_PAYMENTS: &str = "payments";
pub const CF_TOKENS: &str = "tokens";
pub const CF_COMMISSIONS: &str = "commissions";
pub const CF_SUPER_AGENT_COMMISSIONS: &str = "super_agent_commissions";

const COLUMN_FAMILIES: [&str; 9] = [
    CF_LOANS,
    CF_DEVICES,
    CF_AGENTS,
    CF_BUSINESSES,
    CF_DEVICE_TYPES,
    CF_PAYMENTS,
    CF_TOKENS,
    CF_COMMISSIONS,
    CF_SUPER_AGENT_COMMISSIONS,
];

/// A persistent settlement store backed by RocksDB.
///
/// Each entity lives in its own Column Family as JSON. A commit becomes a single
/// `WriteBatch`, so a settlement is either fully on disk or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>` and lock table).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    locks: LockTable,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            locks: LockTable::new(),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::StorageError(format!("column family {name} not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }
}

fn payment_key(business_id: Uuid, transaction_id: &str) -> Vec<u8> {
    let mut key = business_id.as_bytes().to_vec();
    key.extend_from_slice(transaction_id.as_bytes());
    key
}

#[async_trait]
impl Backend for RocksDBStore {
    fn locks(&self) -> &LockTable {
        &self.locks
    }

    async fn get_loan(&self, id: Uuid) -> Result<Option<Loan>> {
        self.get_json(CF_LOANS, id.as_bytes())
    }

    async fn get_device(&self, id: Uuid) -> Result<Option<Device>> {
        self.get_json(CF_DEVICES, id.as_bytes())
    }

    async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>> {
        self.get_json(CF_AGENTS, id.as_bytes())
    }

    async fn get_business(&self, id: Uuid) -> Result<Option<Business>> {
        self.get_json(CF_BUSINESSES, id.as_bytes())
    }

    async fn get_device_type(&self, id: Uuid) -> Result<Option<DeviceType>> {
        self.get_json(CF_DEVICE_TYPES, id.as_bytes())
    }

    async fn get_payment(
        &self,
        business_id: Uuid,
        transaction_id: &str,
    ) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, &payment_key(business_id, transaction_id))
    }

    async fn get_loans(&self) -> Result<Vec<Loan>> {
        self.scan(CF_LOANS)
    }

    async fn apply(&self, changes: Changeset) -> Result<()> {
        let mut batch = WriteBatch::default();
        for (id, loan) in &changes.loans {
            self.put_json(&mut batch, CF_LOANS, id.as_bytes(), loan)?;
        }
        for (id, device) in &changes.devices {
            self.put_json(&mut batch, CF_DEVICES, id.as_bytes(), device)?;
        }
        for (id, agent) in &changes.agents {
            self.put_json(&mut batch, CF_AGENTS, id.as_bytes(), agent)?;
        }
        for (id, business) in &changes.businesses {
            self.put_json(&mut batch, CF_BUSINESSES, id.as_bytes(), business)?;
        }
        for (id, device_type) in &changes.device_types {
            self.put_json(&mut batch, CF_DEVICE_TYPES, id.as_bytes(), device_type)?;
        }
        for payment in &changes.payments {
            let key = payment_key(payment.business_id, &payment.transaction_id);
            self.put_json(&mut batch, CF_PAYMENTS, &key, payment)?;
        }
        for token in &changes.tokens {
            self.put_json(&mut batch, CF_TOKENS, token.id.as_bytes(), token)?;
        }
        for commission in &changes.commissions {
            self.put_json(&mut batch, CF_COMMISSIONS, commission.id.as_bytes(), commission)?;
        }
        for commission in &changes.super_agent_commissions {
            self.put_json(
                &mut batch,
                CF_SUPER_AGENT_COMMISSIONS,
                commission.id.as_bytes(),
                commission,
            )?;
        }
        self.db.write(batch)?;
        Ok(())
    }
}
