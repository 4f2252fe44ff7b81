use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::taxonomy::{taxonomy, RoleLabel};

/// Optional external role-tagging service. Implementations are best-effort:
/// every failure mode (no config, timeout, bad response) is a None, so the
/// classifier cannot tell "unavailable" from "declined to answer".
#[async_trait]
pub trait RoleSuggester: Send + Sync {
    async fn suggest(&self, title: &str, description: &str) -> Option<RoleLabel>;
}

/// Stand-in used when no API key is configured.
pub struct DisabledSuggester;

#[async_trait]
impl RoleSuggester for DisabledSuggester {
    async fn suggest(&self, _title: &str, _description: &str) -> Option<RoleLabel> {
        None
    }
}

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const SUGGEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-backed suggester. The prompt constrains the answer to the taxonomy
/// catalog; anything else (including "other") is treated as no answer.
pub struct OpenAiSuggester {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiSuggester {
    pub fn new(api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SUGGEST_TIMEOUT)
            .build()
            .expect("http client builds");
        Self {
            client,
            api_key,
            model,
        }
    }

    fn prompt(title: &str, description: &str) -> String {
        let catalog = taxonomy()
            .labels()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "You will receive a job title and description.\n\
             Return ONLY one short role label from this list that best matches: {catalog}.\n\
             If none, return \"other\".\n\n\
             Title: {title}\n\
             Description: {description}\n\
             Role:"
        )
    }
}

#[async_trait]
impl RoleSuggester for OpenAiSuggester {
    async fn suggest(&self, title: &str, description: &str) -> Option<RoleLabel> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: Self::prompt(title, description),
            }],
            temperature: 0.0,
        };

        let resp = match self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("role suggestion request failed: {}", e);
                return None;
            }
        };

        if !resp.status().is_success() {
            warn!("role suggestion returned status {}", resp.status());
            return None;
        }

        let parsed: ChatResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("role suggestion response unreadable: {}", e);
                return None;
            }
        };

        let answer = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(|s| s.trim().to_lowercase())?;

        if answer.is_empty() || answer == "other" {
            debug!("suggester declined: {:?}", answer);
            return None;
        }
        Some(RoleLabel::new(&answer))
    }
}
