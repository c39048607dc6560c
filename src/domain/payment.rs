use super::money::Amount;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Webhook,
    Manual,
    AgentCredit,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Success,
    Failed,
}

/// Money received against a loan.
///
/// `(business_id, transaction_id)` is unique and doubles as the idempotency key for
/// provider redeliveries.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub business_id: Uuid,
    pub loan_id: Uuid,
    pub user_id: Uuid,
    pub amount: Amount,
    pub transaction_id: String,
    pub channel: PaymentChannel,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        business_id: Uuid,
        loan_id: Uuid,
        user_id: Uuid,
        amount: Amount,
        transaction_id: impl Into<String>,
        channel: PaymentChannel,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            loan_id,
            user_id,
            amount,
            transaction_id: transaction_id.into(),
            channel,
            status: PaymentStatus::Success,
            created_at,
        }
    }
}

/// An unlock or extension code handed to the customer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Token {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_id: Uuid,
    pub code: String,
    /// `None` for permanent unlocks.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Commission {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub payment_id: Uuid,
    /// The agent's share after any super-agent split.
    pub amount: Decimal,
    /// Rate that produced the total commission. Zero for the fixed first-time bonus.
    pub commission_percentage: Decimal,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SuperAgentCommission {
    pub id: Uuid,
    pub super_agent_id: Uuid,
    pub payment_id: Uuid,
    pub commission_id: Uuid,
    pub amount: Decimal,
    pub commission_percentage: Decimal,
}
