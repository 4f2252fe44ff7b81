use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One outbound message. Bodies are fully rendered HTML.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendReceipt {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("mail request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Transactional email delivery. One attempt per call; retry policy belongs
/// to the caller (the orchestrator deliberately does not retry).
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, MailError>;
}

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Resend HTTP client.
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl ResendMailer {
    pub fn new(api_key: String) -> Self {
        // A hung send must not stall a whole apply run; the per-run
        // deadline is only checked between jobs.
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .expect("http client builds");
        Self {
            client,
            api_key,
            api_url: RESEND_API_URL.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, MailError> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}
