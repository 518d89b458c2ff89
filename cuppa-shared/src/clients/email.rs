use reqwest::Client;
use serde::Serialize;

const DEFAULT_API_URL: &str = "https://api.resend.com/emails";

#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_url: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email client not configured: missing API key")]
    NotConfigured,
    #[error("email send failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email API error (status {status}): {body}")]
    Api { status: u16, body: String },
}

impl EmailClient {
    pub fn new(api_key: &str, from_email: &str, from_name: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), EmailError> {
        if !self.is_configured() {
            return Err(EmailError::NotConfigured);
        }

        let request = ResendRequest {
            from: format!("{} <{}>", self.from_name, self.from_email),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to = %to, subject = %subject, "email sent");
        Ok(())
    }

    /// Tells `to` that their match accepted, listing when the partner is free.
    pub async fn send_match_accepted(
        &self,
        to: &str,
        to_name: &str,
        partner_name: &str,
        partner_email: &str,
        slots: &[String],
    ) -> Result<(), EmailError> {
        let html = render_match_accepted(to_name, partner_name, partner_email, slots);
        self.send_email(to, "Virtual Cuppa - Your match accepted", &html).await
    }
}

/// Escapes text for both element content and quoted attribute values.
fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn render_match_accepted(to_name: &str, partner_name: &str, partner_email: &str, slots: &[String]) -> String {
    let items: String = slots.iter().map(|s| format!("<li>{}</li>", escape_html(s))).collect();
    let to_name = escape_html(to_name);
    let partner_name = escape_html(partner_name);
    let partner_email = escape_html(partner_email);
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
        <h2 style="color: #6b4226;">Virtual Cuppa</h2>
        <p>Hi {to_name},</p>
        <p>{partner_name} accepted your coffee chat. They are available:</p>
        <ul>{items}</ul>
        <p>Reach them at <a href="mailto:{partner_email}">{partner_email}</a> to settle on a time.</p>
        </div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_accepted_lists_every_slot() {
        let html = render_match_accepted(
            "Ada",
            "Grace Hopper",
            "grace@example.com",
            &["Monday Morning".into(), "Friday Afternoon".into()],
        );
        assert!(html.contains("<li>Monday Morning</li><li>Friday Afternoon</li>"));
        assert!(html.contains("mailto:grace@example.com"));
        assert!(html.contains("Hi Ada"));
    }

    #[test]
    fn user_supplied_text_is_escaped() {
        let html = render_match_accepted(
            "Ada <b>",
            "Eve \"the\" Hacker",
            "eve@example.com\"><script>x</script>",
            &["<script>alert('hi')</script> Morning".into()],
        );
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("<li>&lt;script&gt;alert(&#x27;hi&#x27;)&lt;/script&gt; Morning</li>"));
        assert!(html.contains("Hi Ada &lt;b&gt;"));
        assert!(html.contains("Eve &quot;the&quot; Hacker"));
        assert!(html.contains(r#"href="mailto:eve@example.com&quot;&gt;&lt;script&gt;"#));
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_to_send() {
        let client = EmailClient::new("", "noreply@example.com", "Virtual Cuppa");
        let err = client.send_email("a@example.com", "s", "b").await.unwrap_err();
        assert!(matches!(err, EmailError::NotConfigured));
    }
}
