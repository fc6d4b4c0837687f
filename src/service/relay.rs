use async_trait::async_trait;

use crate::model::notification::Notification;

/// Outbound copy of a committed notification. Errors are reported to the
/// caller, who logs them; the stored notification is unaffected.
#[async_trait]
pub trait NotificationRelay: Send + Sync {
    async fn relay(&self, notification: &Notification) -> anyhow::Result<()>;
}
