use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification seam. Delivery is fire-and-forget from the
/// pipeline's perspective; implementations talk to whatever messaging
/// transport the surrounding application uses.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, student_id: i64, message: &str) -> Result<(), NotifyError>;
}

/// Default sink: writes notifications to the log and nothing else.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, student_id: i64, message: &str) -> Result<(), NotifyError> {
        log::info!("notify student {}: {}", student_id, message);
        Ok(())
    }
}
