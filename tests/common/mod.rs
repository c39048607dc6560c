#![allow(dead_code)]

use payg_core::application::payments::{IncomingPayment, PaymentProcessor};
use payg_core::application::settlement::SettlementOrchestrator;
use payg_core::domain::device::{Device, DeviceType, Manufacturer};
use payg_core::domain::loan::{Loan, PaymentFrequency};
use payg_core::domain::money::{Amount, Balance};
use payg_core::domain::party::{Agent, Business};
use payg_core::domain::ports::{Notice, SettlementStore};
use payg_core::infrastructure::in_memory::InMemoryStore;
use payg_core::infrastructure::notifier::ChannelNotifier;
use payg_core::manufacturer::{ManufacturerAdapters, OpenPayGoIssuer};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub const SECRET: &str = "a29ab82edc5fbbc41ec9530f6dac86b1";
pub const WEBHOOK_SECRET: &str = "sk_test_webhook";

pub fn business() -> Business {
    Business {
        id: Uuid::new_v4(),
        name: "Sunrise Energy".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        general_agent_commission_rate: Decimal::from(10),
        general_super_agent_commission_rate: Decimal::from(20),
        first_time_commission: Decimal::ZERO,
        token_validity_days: None,
        biolite: None,
        beebeejump: None,
    }
}

pub fn device_type() -> DeviceType {
    DeviceType {
        id: Uuid::new_v4(),
        name: "SHS-80".to_string(),
        onetime_commission_rate: Decimal::from(5),
    }
}

pub fn openpaygo_device(device_type: &DeviceType) -> Device {
    Device {
        id: Uuid::new_v4(),
        serial_number: format!("OPG-{}", &Uuid::new_v4().simple().to_string()[..8]),
        manufacturer: Manufacturer::OpenPayGo,
        device_type_id: device_type.id,
        non_tokenised: false,
        openpaygo_secret_key: Some(SECRET.to_string()),
        openpaygo_token_count: 0,
        first_time_commission_paid: false,
        assigned_by: None,
    }
}

pub fn agent(business: &Business) -> Agent {
    Agent {
        id: Uuid::new_v4(),
        business_id: business.id,
        commission_rate: Decimal::ZERO,
        super_agent_id: None,
        super_agent_rate: Decimal::ZERO,
        credit_balance: Balance::ZERO,
    }
}

pub fn weekly_loan(business: &Business, device: &Device, total: Decimal, cycle: Decimal) -> Loan {
    Loan::new(
        business.id,
        Uuid::new_v4(),
        device.id,
        total,
        PaymentFrequency::Weekly,
        cycle,
    )
}

/// Everything one settlement needs, already committed to a store.
pub struct World {
    pub store: InMemoryStore,
    pub business: Business,
    pub device_type: DeviceType,
    pub device: Device,
    pub loan: Loan,
}

impl World {
    /// A 10 000 weekly loan with a 1 000 cycle on an OpenPayGo device.
    pub async fn weekly() -> Self {
        Self::build(business(), |business, device| {
            weekly_loan(business, device, Decimal::from(10_000), Decimal::from(1_000))
        })
        .await
    }

    pub async fn build(business: Business, loan: impl FnOnce(&Business, &Device) -> Loan) -> Self {
        let store = InMemoryStore::new();
        let device_type = device_type();
        let device = openpaygo_device(&device_type);
        let loan = loan(&business, &device);

        let world = Self {
            store,
            business,
            device_type,
            device,
            loan,
        };
        let mut uow = world.store.begin().await.unwrap();
        uow.save_business(world.business.clone()).await.unwrap();
        uow.save_device_type(world.device_type.clone()).await.unwrap();
        uow.save_device(world.device.clone()).await.unwrap();
        uow.save_loan(world.loan.clone()).await.unwrap();
        uow.commit().await.unwrap();
        world
    }

    pub async fn save_agent(&self, agent: &Agent) {
        let mut uow = self.store.begin().await.unwrap();
        uow.save_agent(agent.clone()).await.unwrap();
        uow.commit().await.unwrap();
    }

    /// Marks the device as handed out by `agent`.
    pub async fn assign_device(&mut self, agent: &Agent) {
        let agent_id = agent.id;
        self.update_device(|device| device.assigned_by = Some(agent_id))
            .await;
    }

    pub async fn update_device(&mut self, change: impl FnOnce(&mut Device)) {
        change(&mut self.device);
        let mut uow = self.store.begin().await.unwrap();
        uow.save_device(self.device.clone()).await.unwrap();
        uow.commit().await.unwrap();
    }

    pub fn payment(&self, reference: &str, amount: Decimal) -> IncomingPayment {
        IncomingPayment {
            business_id: self.business.id,
            loan_id: self.loan.id,
            user_id: self.loan.customer_id,
            amount: Amount::try_from(amount).unwrap(),
            transaction_id: reference.to_string(),
        }
    }

    pub fn processor(&self) -> (PaymentProcessor, UnboundedReceiver<Notice>) {
        self.processor_with(openpaygo_adapters())
    }

    pub fn processor_with(
        &self,
        adapters: ManufacturerAdapters,
    ) -> (PaymentProcessor, UnboundedReceiver<Notice>) {
        let (notifier, receiver) = ChannelNotifier::new();
        let processor = PaymentProcessor::new(
            Arc::new(self.store.clone()),
            SettlementOrchestrator::new(adapters),
            Arc::new(notifier),
        );
        (processor, receiver)
    }

    pub async fn loan(&self) -> Loan {
        self.store.loan(self.loan.id).await.unwrap()
    }

    pub async fn device(&self) -> Device {
        self.store.device(self.device.id).await.unwrap()
    }
}

pub fn openpaygo_adapters() -> ManufacturerAdapters {
    let mut adapters = ManufacturerAdapters::empty();
    adapters.register(Manufacturer::OpenPayGo, Arc::new(OpenPayGoIssuer));
    adapters
}

/// Waits for the next notice dispatched after a commit.
pub async fn next_notice(receiver: &mut UnboundedReceiver<Notice>) -> Notice {
    tokio::time::timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("notice not dispatched in time")
        .expect("notifier channel closed")
}

/// Serves a single canned HTTP response, after an optional delay.
///
/// Returns the base URL and a handle resolving to the raw request that was received.
pub async fn serve_once(
    status: u16,
    body: &'static str,
    delay: Duration,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        tokio::time::sleep(delay).await;
        let response = format!(
            "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
        request
    });
    (url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if raw.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}
