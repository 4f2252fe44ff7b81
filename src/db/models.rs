use serde::{Deserialize, Serialize};

/// Job posting as stored in the document store. Ingestion happens outside
/// this service, so every field is optional and key spellings vary between
/// feeds; serde aliases absorb the variants.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPosting {
    #[serde(default, alias = "jobTitle")]
    pub title: Option<String>,
    #[serde(default, alias = "jobDescription")]
    pub description: Option<String>,
    #[serde(default, alias = "jobCategory")]
    pub category: Option<String>,
    #[serde(default, alias = "companyName")]
    pub company: Option<String>,

    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub apply_email: Option<String>,
    #[serde(default)]
    pub company_email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub hr_email: Option<String>,
    #[serde(default)]
    pub hr_contact: Option<String>,
    #[serde(default)]
    pub recruiter_email: Option<String>,

    /// Cached classifier output, written back by the categorize pass.
    #[serde(default)]
    pub classification: Option<Classification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl JobPosting {
    /// Non-empty cached tag, if any.
    pub fn cached_tag(&self) -> Option<&str> {
        self.classification
            .as_ref()
            .and_then(|c| c.tag.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("position")
    }
}

/// User profile document at `users/{uid}`. Preferences live in
/// `selectedTitleTags`; an empty set opts the user out of the sweep.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, alias = "name")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default, alias = "title")]
    pub profession: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default, alias = "photoURL")]
    pub profile_image_url: Option<String>,
    #[serde(default, rename = "userCV", alias = "cvURL")]
    pub user_cv: Option<String>,
    #[serde(default)]
    pub selected_title_tags: Vec<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Candidate")
    }

    /// Address for the candidate-facing summary email.
    pub fn summary_address(&self) -> Option<&str> {
        self.email.as_deref().or(self.contact_email.as_deref())
    }
}

/// Idempotence ledger entry at `applyLog/{uid}/{jobId}`. Its existence alone
/// means "never process this pair again"; `delivered_id` is appended after
/// the mailer accepts the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    /// Milliseconds since the epoch, matching the historical log format.
    pub ts: i64,
    pub to: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_posting_tolerates_alias_keys() {
        let job: JobPosting = serde_json::from_value(serde_json::json!({
            "jobTitle": "Senior Electrician Needed",
            "jobDescription": "Wiring work",
            "companyName": "Acme"
        }))
        .unwrap();
        assert_eq!(job.title.as_deref(), Some("Senior Electrician Needed"));
        assert_eq!(job.description.as_deref(), Some("Wiring work"));
        assert_eq!(job.company.as_deref(), Some("Acme"));
    }

    #[test]
    fn cached_tag_ignores_blank_values() {
        let job: JobPosting = serde_json::from_value(serde_json::json!({
            "classification": { "tag": "  " }
        }))
        .unwrap();
        assert_eq!(job.cached_tag(), None);

        let job: JobPosting = serde_json::from_value(serde_json::json!({
            "classification": { "tag": "chef", "source": "ai" }
        }))
        .unwrap();
        assert_eq!(job.cached_tag(), Some("chef"));
    }

    #[test]
    fn user_profile_summary_address_prefers_primary_email() {
        let user: UserProfile = serde_json::from_value(serde_json::json!({
            "email": "a@b.com",
            "contactEmail": "c@d.com"
        }))
        .unwrap();
        assert_eq!(user.summary_address(), Some("a@b.com"));

        let user: UserProfile = serde_json::from_value(serde_json::json!({
            "contactEmail": "c@d.com"
        }))
        .unwrap();
        assert_eq!(user.summary_address(), Some("c@d.com"));
    }
}
