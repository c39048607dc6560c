use crate::domain::ports::{Notice, Notifier};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Writes every notice to the log. The default when no SMS gateway is wired in.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notice: Notice) -> Result<()> {
        match &notice {
            Notice::CodeIssued {
                customer_id,
                loan_id,
                balance,
                expires_at,
                ..
            } => tracing::info!(
                customer = %customer_id,
                loan = %loan_id,
                balance = %balance,
                expires_at = ?expires_at,
                "code issued notice"
            ),
            Notice::PaymentShortfall {
                customer_id,
                loan_id,
                remaining,
                ..
            } => tracing::info!(
                customer = %customer_id,
                loan = %loan_id,
                remaining = %remaining,
                "payment shortfall notice"
            ),
        }
        Ok(())
    }
}

/// Forwards notices to a channel, for callers that deliver them elsewhere.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notice: Notice) -> Result<()> {
        self.sender
            .send(notice)
            .map_err(|e| PaymentError::InternalError(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn shortfall() -> Notice {
        Notice::PaymentShortfall {
            customer_id: Uuid::new_v4(),
            loan_id: Uuid::new_v4(),
            amount_paid: dec!(600),
            remaining: dec!(400),
        }
    }

    #[tokio::test]
    async fn test_channel_notifier_forwards() {
        let (notifier, mut receiver) = ChannelNotifier::new();
        let notice = shortfall();
        notifier.notify(notice.clone()).await.unwrap();
        assert_eq!(receiver.recv().await, Some(notice));
    }

    #[tokio::test]
    async fn test_channel_notifier_fails_when_closed() {
        let (notifier, receiver) = ChannelNotifier::new();
        drop(receiver);
        assert!(notifier.notify(shortfall()).await.is_err());
    }

    #[tokio::test]
    async fn test_tracing_notifier_accepts_everything() {
        assert!(TracingNotifier.notify(shortfall()).await.is_ok());
    }

    #[test]
    fn test_notice_serializes_with_kind() {
        let json = serde_json::to_value(shortfall()).unwrap();
        assert_eq!(json["kind"], "payment_shortfall");
        assert_eq!(json["remaining"], "400");
    }
}
