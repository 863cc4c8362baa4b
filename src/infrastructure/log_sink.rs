use crate::domain::notification::NotificationCategory;
use crate::domain::party::AccountId;
use crate::domain::ports::NotificationSink;
use crate::error::Result;
use async_trait::async_trait;

/// Delivers notifications as structured log events. Used by the replay CLI, where
/// there is no push or email channel to hand them to.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(
        &self,
        receiver: AccountId,
        title: &str,
        message: &str,
        category: NotificationCategory,
    ) -> Result<()> {
        tracing::info!(
            receiver = %receiver,
            category = category.label(),
            title,
            "{message}"
        );
        Ok(())
    }
}
