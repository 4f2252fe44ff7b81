use serde_json::json;
use tracing::{debug, warn};

use crate::db::document_store::{paths, DocumentStore};
use crate::db::models::JobPosting;
use crate::enhance::RoleSuggester;
use crate::taxonomy::{taxonomy, RoleLabel};

/// Searchable text of a posting: title, description, category, company in
/// that order, missing fields dropped, single-space joined, lowercased.
pub fn normalize(job: &JobPosting) -> String {
    [
        job.title.as_deref(),
        job.description.as_deref(),
        job.category.as_deref(),
        job.company.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

/// Assign a role label to a posting.
///
/// A previously computed `classification.tag` is trusted verbatim and never
/// re-validated against the taxonomy, so old tags survive catalog changes.
/// Without one, the first taxonomy entry whose patterns fire on the
/// normalized text wins. None means unclassified, not an error.
pub fn classify(job: &JobPosting) -> Option<RoleLabel> {
    if let Some(tag) = job.cached_tag() {
        return Some(RoleLabel::new(tag));
    }
    let text = normalize(job);
    taxonomy()
        .entries()
        .iter()
        .find(|e| e.rules.iter().any(|r| r.is_match(&text)))
        .map(|e| e.label.clone())
}

/// Like [`classify`], but on a cache miss asks the enhancement service first
/// and persists whichever label came out back onto the job document.
///
/// The enhancement call is best-effort and the write-back is a cache of a
/// pure function's result, so neither failure surfaces to the caller.
pub async fn classify_and_cache(
    job_id: &str,
    job: &JobPosting,
    suggester: &dyn RoleSuggester,
    store: &dyn DocumentStore,
) -> Option<RoleLabel> {
    if let Some(tag) = job.cached_tag() {
        return Some(RoleLabel::new(tag));
    }

    let suggested = suggester
        .suggest(
            job.title.as_deref().unwrap_or(""),
            job.description.as_deref().unwrap_or(""),
        )
        .await;
    let source = if suggested.is_some() { "ai" } else { "rules" };
    let label = suggested.or_else(|| classify(job))?;

    debug!("caching classification {} ({}) for job {}", label, source, job_id);
    let partial = json!({ "classification": { "tag": label.as_str(), "source": source } });
    if let Err(e) = store.update(&paths::job(job_id), partial).await {
        warn!("failed to cache classification for job {}: {}", job_id, e);
    }
    Some(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::document_store::testing::MemoryStore;
    use crate::enhance::testing::FixedSuggester;
    use crate::enhance::DisabledSuggester;

    fn job(value: serde_json::Value) -> JobPosting {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn normalize_title_only_is_just_lowercased_title() {
        let j = job(serde_json::json!({ "title": "Barista" }));
        assert_eq!(normalize(&j), "barista");
    }

    #[test]
    fn normalize_orders_fields_and_lowercases() {
        let j = job(serde_json::json!({
            "title": "Head Chef",
            "description": "Busy kitchen",
            "jobCategory": "Hospitality",
            "company": "Acme"
        }));
        assert_eq!(normalize(&j), "head chef busy kitchen hospitality acme");
    }

    #[test]
    fn classify_matches_taxonomy_rules() {
        let j = job(serde_json::json!({ "title": "Senior Electrician Needed" }));
        assert_eq!(classify(&j), Some(RoleLabel::new("electrician")));
    }

    #[test]
    fn classify_returns_none_when_nothing_fires() {
        let j = job(serde_json::json!({ "title": "Unrelated posting" }));
        assert_eq!(classify(&j), None);
    }

    #[test]
    fn cached_tag_beats_rules_regardless_of_text() {
        let j = job(serde_json::json!({
            "title": "Senior Electrician Needed",
            "classification": { "tag": "plumber" }
        }));
        assert_eq!(classify(&j), Some(RoleLabel::new("plumber")));
    }

    #[test]
    fn cached_tag_is_not_validated_against_taxonomy() {
        let j = job(serde_json::json!({
            "classification": { "tag": "Underwater Basket Weaver" }
        }));
        assert_eq!(classify(&j), Some(RoleLabel::new("underwater basket weaver")));
    }

    #[tokio::test]
    async fn classify_and_cache_prefers_suggestion_and_writes_back() {
        let store = MemoryStore::new();
        let suggester = FixedSuggester(Some(RoleLabel::new("chef")));
        let j = job(serde_json::json!({ "title": "Senior Electrician Needed" }));

        let label = classify_and_cache("j1", &j, &suggester, &store).await;
        assert_eq!(label, Some(RoleLabel::new("chef")));

        let doc = store.get("jobs/j1").await.unwrap().unwrap();
        assert_eq!(doc["classification"]["tag"], "chef");
        assert_eq!(doc["classification"]["source"], "ai");
    }

    #[tokio::test]
    async fn classify_and_cache_degrades_to_rules_without_service() {
        let store = MemoryStore::new();
        let j = job(serde_json::json!({ "title": "Senior Electrician Needed" }));

        let label = classify_and_cache("j1", &j, &DisabledSuggester, &store).await;
        assert_eq!(label, Some(RoleLabel::new("electrician")));

        let doc = store.get("jobs/j1").await.unwrap().unwrap();
        assert_eq!(doc["classification"]["source"], "rules");
    }

    #[tokio::test]
    async fn classify_and_cache_skips_write_on_cache_hit() {
        let store = MemoryStore::new();
        let j = job(serde_json::json!({ "classification": { "tag": "baker" } }));

        let label = classify_and_cache("j1", &j, &DisabledSuggester, &store).await;
        assert_eq!(label, Some(RoleLabel::new("baker")));
        assert!(!store.contains("jobs/j1"));
    }
}
