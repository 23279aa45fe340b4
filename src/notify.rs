use async_trait::async_trait;

/// Chat identity of an operator. For Telegram this is the user id, which is
/// also the id of the private chat with the bot.
pub type OperatorId = i64;

/// Outbound messages. Delivery is fire-and-forget: implementations log their
/// own failures and never retry.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_message(&self, recipient: OperatorId, text: &str);
}
