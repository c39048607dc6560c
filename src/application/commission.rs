use crate::domain::device::{Device, DeviceType};
use crate::domain::money::{percent_of, round_money};
use crate::domain::party::{Agent, Business};
use crate::domain::payment::{Commission, SuperAgentCommission};
use crate::domain::ports::UnitOfWork;
use crate::error::Result;
use rust_decimal::Decimal;
use uuid::Uuid;

/// What the commission is computed against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommissionBasis {
    /// Instalment loans: the amount just settled.
    Settled(Decimal),
    /// Full cash sales: the sale price at the device type's one-time rate.
    OneTimeSale {
        sale_price: Decimal,
        onetime_rate: Decimal,
    },
}

impl CommissionBasis {
    pub fn for_sale(is_one_time: bool, settled: Decimal, sale_price: Decimal, device_type: &DeviceType) -> Self {
        if is_one_time {
            CommissionBasis::OneTimeSale {
                sale_price,
                onetime_rate: device_type.onetime_commission_rate,
            }
        } else {
            CommissionBasis::Settled(settled)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuperAgentShare {
    pub super_agent_id: Uuid,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Outcome of one commission computation.
///
/// `agent_amount + super_agent.amount == total` always holds exactly: the super-agent
/// share is rounded and the agent keeps the difference.
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionSplit {
    pub agent_id: Uuid,
    pub total: Decimal,
    /// Zero when the fixed first-time bonus was paid.
    pub rate: Decimal,
    pub first_time_bonus: bool,
    pub agent_amount: Decimal,
    pub super_agent: Option<SuperAgentShare>,
}

/// Computes the commission for `agent` without touching any state.
pub fn compute(
    agent: &Agent,
    business: &Business,
    device: &Device,
    basis: CommissionBasis,
) -> CommissionSplit {
    let bonus_available =
        !device.first_time_commission_paid && business.first_time_commission > Decimal::ZERO;

    let (total, rate) = if bonus_available {
        (round_money(business.first_time_commission), Decimal::ZERO)
    } else {
        match basis {
            CommissionBasis::Settled(amount) => {
                let rate = effective_rate(agent.commission_rate, business.general_agent_commission_rate);
                (percent_of(amount, rate), rate)
            }
            CommissionBasis::OneTimeSale {
                sale_price,
                onetime_rate,
            } => (percent_of(sale_price, onetime_rate), onetime_rate),
        }
    };

    let super_agent = agent.super_agent_id.map(|super_agent_id| {
        let rate = effective_rate(
            agent.super_agent_rate,
            business.general_super_agent_commission_rate,
        );
        SuperAgentShare {
            super_agent_id,
            rate,
            amount: percent_of(total, rate),
        }
    });
    let agent_amount = total - super_agent.as_ref().map_or(Decimal::ZERO, |s| s.amount);

    CommissionSplit {
        agent_id: agent.id,
        total,
        rate,
        first_time_bonus: bonus_available,
        agent_amount,
        super_agent,
    }
}

fn effective_rate(own: Decimal, general: Decimal) -> Decimal {
    if own > Decimal::ZERO { own } else { general }
}

/// Computes and stages the commission rows for the agent who assigned `device`.
///
/// Consumes the device's first-time bonus when it applies; the caller saves `device`.
/// Returns `None` when nobody is owed anything.
pub async fn record(
    uow: &mut dyn UnitOfWork,
    device: &mut Device,
    business: &Business,
    basis: CommissionBasis,
    payment_id: Uuid,
) -> Result<Option<CommissionSplit>> {
    let Some(agent_id) = device.assigned_by else {
        return Ok(None);
    };
    let agent = uow.lock_agent(agent_id).await?;
    let split = compute(&agent, business, device, basis);
    if split.total <= Decimal::ZERO {
        tracing::debug!(agent = %agent_id, "no commission due");
        return Ok(None);
    }
    if split.first_time_bonus {
        device.first_time_commission_paid = true;
    }

    let commission = Commission {
        id: Uuid::new_v4(),
        agent_id,
        payment_id,
        amount: split.agent_amount,
        commission_percentage: split.rate,
    };
    let commission_id = commission.id;
    uow.insert_commission(commission).await?;

    if let Some(share) = &split.super_agent {
        uow.insert_super_agent_commission(SuperAgentCommission {
            id: Uuid::new_v4(),
            super_agent_id: share.super_agent_id,
            payment_id,
            commission_id,
            amount: share.amount,
            commission_percentage: share.rate,
        })
        .await?;
    }

    tracing::info!(
        agent = %agent_id,
        total = %split.total,
        agent_amount = %split.agent_amount,
        super_agent_amount = %split.super_agent.as_ref().map_or(Decimal::ZERO, |s| s.amount),
        first_time_bonus = split.first_time_bonus,
        "commission recorded"
    );
    Ok(Some(split))
}
