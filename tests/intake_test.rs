mod common;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use common::{World, WEBHOOK_SECRET, agent};
use payg_core::application::payments::PaymentOutcome;
use payg_core::application::schedule;
use payg_core::application::webhook::{self, ChargeData, ChargeMetadata, WebhookEvent};
use payg_core::domain::device::{Device, Manufacturer};
use payg_core::domain::loan::{Loan, LoanStatus, PaymentFrequency, Validity};
use payg_core::domain::money::Balance;
use payg_core::domain::party::Business;
use payg_core::domain::ports::SettlementStore;
use payg_core::error::{PaymentError, Result};
use payg_core::infrastructure::unit_of_work::Backend;
use payg_core::manufacturer::{CodeIssuer, ManufacturerAdapters, OpenPayGoIssuer};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn charge(world: &World, event: &str, reference: &str, minor_units: i64) -> Vec<u8> {
    serde_json::to_vec(&WebhookEvent {
        event: event.to_string(),
        data: ChargeData {
            reference: reference.to_string(),
            amount_minor_units: minor_units,
            metadata: ChargeMetadata {
                user_id: world.loan.customer_id,
                loan_id: world.loan.id,
                business_id: world.business.id,
            },
        },
    })
    .unwrap()
}

#[tokio::test]
async fn test_signed_webhook_settles_once() {
    let world = World::weekly().await;
    let (processor, _notices) = world.processor();
    let body = charge(&world, "charge.success", "psk_001", 100_000);
    let signature = webhook::sign(WEBHOOK_SECRET, &body).unwrap();

    let outcome = processor.process_webhook(&body, &signature).await.unwrap();
    assert!(matches!(
        outcome,
        PaymentOutcome::Settled { settled_amount, .. } if settled_amount == dec!(1000)
    ));

    let replay = processor.process_webhook(&body, &signature).await.unwrap();
    assert!(matches!(replay, PaymentOutcome::Duplicate { .. }));
    assert_eq!(world.loan().await.amount_paid.value(), dec!(1000));
}

#[tokio::test]
async fn test_webhook_with_bad_signature_is_rejected() {
    let world = World::weekly().await;
    let (processor, _notices) = world.processor();
    let body = charge(&world, "charge.success", "psk_002", 100_000);
    let forged = webhook::sign("someone-else", &body).unwrap();

    let err = processor.process_webhook(&body, &forged).await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSignature));
    let err = processor.process_webhook(&body, "not-hex").await.unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSignature));

    assert!(world.store.payments().await.is_empty());
}

#[tokio::test]
async fn test_non_charge_events_are_ignored() {
    let world = World::weekly().await;
    let (processor, _notices) = world.processor();
    let body = charge(&world, "transfer.success", "psk_003", 100_000);
    let signature = webhook::sign(WEBHOOK_SECRET, &body).unwrap();

    let outcome = processor.process_webhook(&body, &signature).await.unwrap();
    assert_eq!(
        outcome,
        PaymentOutcome::Ignored {
            event: "transfer.success".to_string()
        }
    );
    assert!(world.store.payments().await.is_empty());
}

#[tokio::test]
async fn test_agent_credit_pays_and_debits() {
    let world = World::weekly().await;
    let mut payer = agent(&world.business);
    payer.credit_balance = Balance::new(dec!(1500));
    world.save_agent(&payer).await;
    let (processor, _notices) = world.processor();

    let outcome = processor
        .pay_with_agent_credit(payer.id, world.payment("credit-1", dec!(1000)))
        .await
        .unwrap();
    assert!(matches!(outcome, PaymentOutcome::Settled { .. }));
    assert_eq!(
        world.store.agent(payer.id).await.unwrap().credit_balance.value(),
        dec!(500)
    );

    let err = processor
        .pay_with_agent_credit(payer.id, world.payment("credit-2", dec!(1000)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::InsufficientCredit { requested, available }
            if requested == dec!(1000) && available == dec!(500)
    ));

    let replay = processor
        .pay_with_agent_credit(payer.id, world.payment("credit-1", dec!(1000)))
        .await
        .unwrap();
    assert!(matches!(replay, PaymentOutcome::Duplicate { .. }));

    assert_eq!(
        world.store.agent(payer.id).await.unwrap().credit_balance.value(),
        dec!(500)
    );
    assert_eq!(world.store.payments().await.len(), 1);
    assert_eq!(world.loan().await.amount_paid.value(), dec!(1000));
}

#[tokio::test]
async fn test_agent_credit_refund_on_failed_settlement() {
    let world = World::weekly().await;
    let mut payer = agent(&world.business);
    payer.credit_balance = Balance::new(dec!(5000));
    world.save_agent(&payer).await;
    // No issuer for the device, so settlement fails after the debit was staged.
    let (processor, _notices) =
        world.processor_with(payg_core::manufacturer::ManufacturerAdapters::empty());

    assert!(
        processor
            .pay_with_agent_credit(payer.id, world.payment("credit-1", dec!(1000)))
            .await
            .is_err()
    );
    assert_eq!(
        world.store.agent(payer.id).await.unwrap().credit_balance.value(),
        dec!(5000)
    );
}

/// OpenPayGo issuer that takes a while, so concurrent settlements overlap.
struct SlowIssuer;

#[async_trait]
impl CodeIssuer for SlowIssuer {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn issue_code(
        &self,
        device: &mut Device,
        business: &Business,
        validity: Validity,
    ) -> Result<String> {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        OpenPayGoIssuer.issue_code(device, business, validity).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_crossed_agent_credit_payments_both_settle() {
    // Agent A pays for a device C handed out while C pays for one A handed out.
    let mut world = World::weekly().await;
    let mut payer_a = agent(&world.business);
    payer_a.credit_balance = Balance::new(dec!(5000));
    let mut payer_c = agent(&world.business);
    payer_c.credit_balance = Balance::new(dec!(5000));
    world.save_agent(&payer_a).await;
    world.save_agent(&payer_c).await;
    world.assign_device(&payer_c).await;

    let mut other_device = common::openpaygo_device(&world.device_type);
    other_device.assigned_by = Some(payer_a.id);
    let other_loan = common::weekly_loan(&world.business, &other_device, dec!(10000), dec!(1000));
    let mut uow = world.store.begin().await.unwrap();
    uow.save_device(other_device).await.unwrap();
    uow.save_loan(other_loan.clone()).await.unwrap();
    uow.commit().await.unwrap();

    let mut adapters = ManufacturerAdapters::empty();
    adapters.register(Manufacturer::OpenPayGo, Arc::new(SlowIssuer));
    let (processor, _notices) = world.processor_with(adapters);

    for round in 0..3 {
        let first = {
            let processor = processor.clone();
            let payment = world.payment(&format!("credit-a-{round}"), dec!(1000));
            let payer = payer_a.id;
            tokio::spawn(async move { processor.pay_with_agent_credit(payer, payment).await })
        };
        let second = {
            let processor = processor.clone();
            let mut payment = world.payment(&format!("credit-c-{round}"), dec!(1000));
            payment.loan_id = other_loan.id;
            payment.user_id = other_loan.customer_id;
            let payer = payer_c.id;
            tokio::spawn(async move { processor.pay_with_agent_credit(payer, payment).await })
        };

        let (first, second) = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            (first.await, second.await)
        })
        .await
        .expect("crossed agent-credit payments never finished");
        assert!(matches!(first.unwrap().unwrap(), PaymentOutcome::Settled { .. }));
        assert!(matches!(second.unwrap().unwrap(), PaymentOutcome::Settled { .. }));
    }

    for payer in [payer_a.id, payer_c.id] {
        assert_eq!(
            world.store.agent(payer).await.unwrap().credit_balance.value(),
            dec!(2000)
        );
    }
    assert_eq!(world.store.commissions().await.len(), 6);
    assert!(world.store.locks().is_empty());
}

fn one_time(world_business: &payg_core::domain::party::Business, device_id: uuid::Uuid) -> Loan {
    Loan::new(
        world_business.id,
        uuid::Uuid::new_v4(),
        device_id,
        dec!(5000),
        PaymentFrequency::OneTime,
        dec!(0),
    )
}

#[tokio::test]
async fn test_one_time_sale_settles_in_full() {
    let mut world = World::build(common::business(), |business, device| {
        one_time(business, device.id)
    })
    .await;
    let seller = agent(&world.business);
    world.save_agent(&seller).await;
    world.assign_device(&seller).await;
    let (processor, _notices) = world.processor();

    let outcome = processor
        .record_manual_payment(world.payment("cash-1", dec!(5000)))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PaymentOutcome::Settled { validity: Validity::Permanent, .. }
    ));

    let loan = world.loan().await;
    assert_eq!(loan.status, LoanStatus::Completed);
    assert_eq!(loan.balance.value(), dec!(0));

    // 5% one-time rate on the 5000 sale price.
    let commissions = world.store.commissions().await;
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].amount, dec!(250));
    assert_eq!(commissions[0].commission_percentage, dec!(5));
}

#[tokio::test]
async fn test_partial_one_time_payment_is_rejected() {
    let world = World::build(common::business(), |business, device| {
        one_time(business, device.id)
    })
    .await;
    let (processor, _notices) = world.processor();

    let err = processor
        .record_manual_payment(world.payment("cash-1", dec!(2000)))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::ValidationError(_)));
    assert_eq!(world.loan().await, world.loan);
    assert!(world.store.payments().await.is_empty());
}

#[tokio::test]
async fn test_overdue_sweep_and_recovery() {
    let world = World::weekly().await;
    let (processor, _notices) = world.processor();
    let day_one = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

    processor
        .record_manual_payment_at(world.payment("ref-1", dec!(1000)), day_one)
        .await
        .unwrap();
    assert_eq!(
        world.loan().await.next_payment_date,
        Some(day_one + Duration::days(7))
    );

    // Not yet due.
    let flagged = schedule::flag_overdue(&world.store, day_one + Duration::days(6))
        .await
        .unwrap();
    assert!(flagged.is_empty());

    let late = day_one + Duration::days(9);
    let flagged = schedule::flag_overdue(&world.store, late).await.unwrap();
    assert_eq!(flagged, vec![world.loan.id]);
    assert_eq!(world.loan().await.status, LoanStatus::Overdue);

    processor
        .record_manual_payment_at(world.payment("ref-2", dec!(1000)), late)
        .await
        .unwrap();
    let loan = world.loan().await;
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.next_payment_date, Some(late + Duration::days(7)));
}

#[tokio::test]
async fn test_pause_shifts_due_date() {
    let world = World::weekly().await;
    let (processor, _notices) = world.processor();
    let start = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
    processor
        .record_manual_payment_at(world.payment("ref-1", dec!(1000)), start)
        .await
        .unwrap();

    let paused = schedule::pause_loan(&world.store, world.loan.id, start + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(paused.status, LoanStatus::Paused);

    // Paused loans are not swept.
    let flagged = schedule::flag_overdue(&world.store, start + Duration::days(30))
        .await
        .unwrap();
    assert!(flagged.is_empty());

    let resumed = schedule::resume_loan(&world.store, world.loan.id, start + Duration::days(5))
        .await
        .unwrap();
    assert_eq!(resumed.status, LoanStatus::Active);
    assert_eq!(resumed.next_payment_date, Some(start + Duration::days(10)));

    assert!(
        schedule::resume_loan(&world.store, world.loan.id, start + Duration::days(6))
            .await
            .is_err()
    );
}
