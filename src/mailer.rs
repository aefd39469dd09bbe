use axum::async_trait;
use tracing::info;

/// Outbound mail delivery. Transport is an external collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Default sender: writes the message to the log stream.
#[derive(Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(to = %to, subject = %subject, body = %body, "outbound mail");
        Ok(())
    }
}
