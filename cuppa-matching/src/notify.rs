use async_trait::async_trait;

use cuppa_shared::clients::email::EmailClient;

use crate::matching::availability::AvailabilitySlot;
use crate::models::User;

/// Outbound "your match accepted" message. Delivery is best effort: callers
/// log a failure and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_match_accepted(
        &self,
        to: &User,
        from_name: &str,
        from_email: &str,
        slots: &[AvailabilitySlot],
    ) -> anyhow::Result<()>;
}

pub struct EmailNotifier {
    client: EmailClient,
}

impl EmailNotifier {
    pub fn new(client: EmailClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify_match_accepted(
        &self,
        to: &User,
        from_name: &str,
        from_email: &str,
        slots: &[AvailabilitySlot],
    ) -> anyhow::Result<()> {
        let lines: Vec<String> = slots.iter().map(ToString::to_string).collect();
        self.client
            .send_match_accepted(&to.email, &to.full_name(), from_name, from_email, &lines)
            .await?;
        tracing::info!(to = %to.id, slots = lines.len(), "match accepted email sent");
        Ok(())
    }
}

/// Used when no e-mail API key is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_match_accepted(
        &self,
        to: &User,
        from_name: &str,
        _from_email: &str,
        slots: &[AvailabilitySlot],
    ) -> anyhow::Result<()> {
        tracing::info!(to = %to.id, from = %from_name, slots = slots.len(), "match accepted notification (email disabled)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::user_with_tags;

    #[tokio::test]
    async fn unconfigured_email_client_surfaces_an_error() {
        let notifier = EmailNotifier::new(EmailClient::new("", "noreply@cuppa.test", "Virtual Cuppa"));
        let to = user_with_tags(&[]);
        let slots = vec![AvailabilitySlot {
            day: "Monday".into(),
            period: "Morning".into(),
        }];

        let result = notifier.notify_match_accepted(&to, "Ada Lovelace", "ada@example.com", &slots).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let to = user_with_tags(&[]);
        assert!(LogNotifier.notify_match_accepted(&to, "Ada", "ada@example.com", &[]).await.is_ok());
    }
}
