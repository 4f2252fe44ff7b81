use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::db::models::JobPosting;

/// Permissive on purpose: postings carry addresses in free text.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}")
        .case_insensitive(true)
        .build()
        .expect("email pattern compiles")
});

static NO_REPLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(no[-._]?reply|do[-._]?not[-._]?reply)").expect("pattern compiles"));

const PLACEHOLDER_DOMAIN: &str = "@example.com";

/// Destinations worth sending to for one boilerplate block, at most.
const MAX_CONTACTS: usize = 3;

/// Candidate application addresses for a posting: explicit contact fields
/// first, then a free-text scan of the description and title. Lowercased,
/// deduplicated in first-seen order, placeholders and no-reply boxes
/// dropped, capped at [`MAX_CONTACTS`]. Never fails; empty means "no way to
/// apply by email".
pub fn extract_contacts(job: &JobPosting) -> Vec<String> {
    let fields = [
        job.email.as_deref(),
        job.contact_email.as_deref(),
        job.apply_email.as_deref(),
        job.company_email.as_deref(),
        job.contact.as_deref(),
        job.hr_email.as_deref(),
        job.hr_contact.as_deref(),
        job.recruiter_email.as_deref(),
        job.description.as_deref(),
        job.title.as_deref(),
    ];

    let mut found = Vec::new();
    for text in fields.into_iter().flatten() {
        for m in EMAIL_RE.find_iter(text) {
            let addr = m.as_str().trim().to_lowercase();
            if addr.ends_with(PLACEHOLDER_DOMAIN) || NO_REPLY_RE.is_match(&addr) {
                continue;
            }
            if !found.contains(&addr) {
                found.push(addr);
            }
            if found.len() == MAX_CONTACTS {
                return found;
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(value: serde_json::Value) -> JobPosting {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn dedupes_and_drops_placeholder_domain() {
        let j = job(serde_json::json!({
            "email": "a@x.com",
            "description": "contact a@x.com or fake@example.com"
        }));
        assert_eq!(extract_contacts(&j), vec!["a@x.com"]);
    }

    #[test]
    fn explicit_fields_come_before_free_text() {
        let j = job(serde_json::json!({
            "contactEmail": "HR@Firm.com",
            "description": "apply via jobs@firm.com"
        }));
        assert_eq!(extract_contacts(&j), vec!["hr@firm.com", "jobs@firm.com"]);
    }

    #[test]
    fn drops_no_reply_addresses() {
        let j = job(serde_json::json!({
            "description": "noreply@board.com or no-reply@board.com, humans: hr@board.com"
        }));
        assert_eq!(extract_contacts(&j), vec!["hr@board.com"]);
    }

    #[test]
    fn caps_result_at_three() {
        let j = job(serde_json::json!({
            "description": "a@x.com b@x.com c@x.com d@x.com e@x.com"
        }));
        assert_eq!(extract_contacts(&j).len(), 3);
    }

    #[test]
    fn empty_posting_yields_empty_vec() {
        assert!(extract_contacts(&JobPosting::default()).is_empty());
    }
}
