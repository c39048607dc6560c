use crate::domain::device::{Device, DeviceType};
use crate::domain::loan::{Loan, PaymentFrequency};
use crate::domain::party::{Agent, Business};
use crate::domain::ports::SettlementStore;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

/// A loan as it is first registered, before any payment.
#[derive(Debug, Deserialize, Clone)]
pub struct LoanSeed {
    pub id: Uuid,
    pub business_id: Uuid,
    pub customer_id: Uuid,
    pub device_id: Uuid,
    pub total_amount: Decimal,
    pub payment_frequency: PaymentFrequency,
    #[serde(default)]
    pub payment_cycle_amount: Decimal,
}

impl From<LoanSeed> for Loan {
    fn from(seed: LoanSeed) -> Self {
        let mut loan = Loan::new(
            seed.business_id,
            seed.customer_id,
            seed.device_id,
            seed.total_amount,
            seed.payment_frequency,
            seed.payment_cycle_amount,
        );
        loan.id = seed.id;
        loan
    }
}

/// Reference data loaded into a store before a batch run.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SeedData {
    pub businesses: Vec<Business>,
    pub device_types: Vec<DeviceType>,
    pub agents: Vec<Agent>,
    pub devices: Vec<Device>,
    pub loans: Vec<LoanSeed>,
}

impl SeedData {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Writes everything in one unit of work, skipping ids the store already holds.
    ///
    /// Existing rows are left untouched so a persistent store can be reseeded
    /// between batches without resetting balances or counters.
    pub async fn load_into(self, store: &dyn SettlementStore) -> Result<()> {
        let mut uow = store.begin().await?;
        let mut added = 0usize;
        let mut skipped = 0usize;
        let mut tally = |fresh: bool| {
            if fresh {
                added += 1;
            } else {
                skipped += 1;
            }
        };

        for business in self.businesses {
            let fresh = is_missing(uow.business(business.id).await)?;
            if fresh {
                uow.save_business(business).await?;
            }
            tally(fresh);
        }
        for device_type in self.device_types {
            let fresh = is_missing(uow.device_type(device_type.id).await)?;
            if fresh {
                uow.save_device_type(device_type).await?;
            }
            tally(fresh);
        }
        for loan in self.loans.into_iter().map(Loan::from) {
            let fresh = is_missing(uow.lock_loan(loan.id).await)?;
            if fresh {
                uow.save_loan(loan).await?;
            }
            tally(fresh);
        }
        for device in self.devices {
            let fresh = is_missing(uow.lock_device(device.id).await)?;
            if fresh {
                uow.save_device(device).await?;
            }
            tally(fresh);
        }
        for agent in self.agents {
            let fresh = is_missing(uow.lock_agent(agent.id).await)?;
            if fresh {
                uow.save_agent(agent).await?;
            }
            tally(fresh);
        }
        uow.commit().await?;
        tracing::info!(added, skipped, "seed data loaded");
        Ok(())
    }
}

fn is_missing<T>(lookup: Result<T>) -> Result<bool> {
    match lookup {
        Ok(_) => Ok(false),
        Err(PaymentError::NotFound { .. }) => Ok(true),
        Err(e) => Err(e),
    }
}
