use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::classify::classify_and_cache;
use crate::config::Config;
use crate::contacts::extract_contacts;
use crate::db::document_store::{paths, DocumentStore, StoreError};
use crate::db::models::{ApplicationRecord, JobPosting, UserProfile};
use crate::emails;
use crate::enhance::RoleSuggester;
use crate::mailer::{Mailer, OutboundEmail};
use crate::matcher::matches;
use crate::taxonomy::RoleLabel;

/// Service-level errors
#[derive(Debug)]
pub enum ServiceError {
    /// Required credential missing; checked once at run start
    Configuration(String),

    /// User/profile missing — "nothing to do", not a fault
    NotFound(String),

    /// Document store operation failed
    Store(StoreError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            ServiceError::NotFound(msg) => write!(f, "not found: {}", msg),
            ServiceError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Store(e)
    }
}

/// Result of one user's apply run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub attempted: u32,
    pub labels_used: Vec<RoleLabel>,
}

/// Aggregate of an all-users sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub users: u32,
    pub attempted: u32,
}

/// Knobs the orchestrator needs, lifted out of [`Config`].
#[derive(Clone, Debug)]
pub struct ApplySettings {
    pub from_email: String,
    pub brand_base_url: String,
    pub max_title_tags: usize,
    pub send_delay: Duration,
    pub user_delay: Duration,
    pub categorize_delay: Duration,
    pub run_deadline: Duration,
    pub categorize_batch_limit: usize,
}

impl ApplySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            from_email: config.from_email.clone(),
            brand_base_url: config.brand_base_url.clone(),
            max_title_tags: config.max_title_tags,
            send_delay: config.send_delay,
            user_delay: config.user_delay,
            categorize_delay: config.categorize_delay,
            run_deadline: config.run_deadline,
            categorize_batch_limit: config.categorize_batch_limit,
        }
    }
}

/// Apply orchestrator: matches postings against a user's preferences,
/// dispatches application emails, and keeps the per-(user, job) ledger that
/// makes repeated runs idempotent.
pub struct ApplyService {
    store: Arc<dyn DocumentStore>,
    mailer: Option<Arc<dyn Mailer>>,
    suggester: Arc<dyn RoleSuggester>,
    settings: ApplySettings,
}

impl ApplyService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        mailer: Option<Arc<dyn Mailer>>,
        suggester: Arc<dyn RoleSuggester>,
        settings: ApplySettings,
    ) -> Self {
        Self {
            store,
            mailer,
            suggester,
            settings,
        }
    }

    fn mailer(&self) -> Result<Arc<dyn Mailer>, ServiceError> {
        self.mailer
            .clone()
            .ok_or_else(|| ServiceError::Configuration("RESEND_API_KEY missing".to_string()))
    }

    /// Normalize and clamp a raw preference set to the configured maximum.
    fn clamp_labels(&self, raw: &[String]) -> Vec<RoleLabel> {
        let mut labels: Vec<RoleLabel> = Vec::new();
        for tag in raw {
            let label = RoleLabel::new(tag);
            if !label.is_empty() && !labels.contains(&label) {
                labels.push(label);
            }
            if labels.len() == self.settings.max_title_tags {
                break;
            }
        }
        labels
    }

    async fn load_user(&self, uid: &str) -> Result<UserProfile, ServiceError> {
        let value = self
            .store
            .get(&paths::user(uid))
            .await?
            .ok_or_else(|| ServiceError::NotFound("user profile not found".to_string()))?;
        serde_json::from_value(value)
            .map_err(|_| ServiceError::NotFound("user profile not readable".to_string()))
    }

    /// Manual trigger: apply for one user with an explicit label set.
    pub async fn apply_now(&self, uid: &str, title_tags: &[String]) -> Result<RunSummary, ServiceError> {
        let mailer = self.mailer()?;
        let wanted = self.clamp_labels(title_tags);
        let user = self.load_user(uid).await?;
        info!("Service: apply run for uid={} with {} labels", uid, wanted.len());
        self.run_apply(uid, &user, wanted, mailer).await
    }

    /// One user's apply run.
    ///
    /// Per-job pipeline: already-applied → skip; no match → skip; no
    /// contact → skip; then reserve the ledger entry, send, and confirm.
    /// The reservation is an atomic create, so a manual trigger racing the
    /// daily sweep cannot double-send; a failed send releases it again,
    /// which keeps failures retryable on later runs. Transport acceptance
    /// by the mail API counts as delivered — a later bounce is not retried.
    async fn run_apply(
        &self,
        uid: &str,
        user: &UserProfile,
        wanted: Vec<RoleLabel>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<RunSummary, ServiceError> {
        let jobs = self.store.list(paths::JOBS_PREFIX).await?;
        let applied: HashSet<String> = self
            .store
            .list(&paths::apply_log_prefix(uid))
            .await?
            .into_iter()
            .filter_map(|(path, _)| path.rsplit('/').next().map(str::to_string))
            .collect();

        let deadline = Instant::now() + self.settings.run_deadline;
        let mut attempted: u32 = 0;

        for (path, value) in jobs {
            if Instant::now() >= deadline {
                warn!("apply run for uid={} hit deadline, returning partial summary", uid);
                break;
            }
            let job_id = path.strip_prefix(paths::JOBS_PREFIX).unwrap_or(&path);
            let job: JobPosting = match serde_json::from_value(value) {
                Ok(job) => job,
                Err(e) => {
                    warn!("skipping unreadable job {}: {}", job_id, e);
                    continue;
                }
            };

            if applied.contains(job_id) {
                continue;
            }
            if !matches(&job, &wanted) {
                continue;
            }
            let contacts = extract_contacts(&job);
            let Some(to) = contacts.first() else {
                debug!("job {} matched but has no contact address", job_id);
                continue;
            };

            let record = ApplicationRecord {
                ts: Utc::now().timestamp_millis(),
                to: to.clone(),
                title: job.title.clone().unwrap_or_default(),
                delivered_id: None,
            };
            let ledger_path = paths::apply_log(uid, job_id);
            let record_value = match serde_json::to_value(&record) {
                Ok(v) => v,
                Err(e) => {
                    error!("could not encode ledger record for job {}: {}", job_id, e);
                    continue;
                }
            };
            match self.store.create(&ledger_path, record_value).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!("job {} already reserved by a concurrent run", job_id);
                    continue;
                }
                Err(e) => {
                    // Without a ledger entry a send could repeat later.
                    error!("ledger reservation failed for job {}: {}", job_id, e);
                    continue;
                }
            }

            let email = OutboundEmail {
                from: self.settings.from_email.clone(),
                to: to.clone(),
                subject: emails::application_subject(user, &job),
                html: emails::application_html(&self.settings.brand_base_url, user, &job),
            };
            match mailer.send(&email).await {
                Ok(receipt) => {
                    attempted += 1;
                    info!("applied to job {} for uid={} via {}", job_id, uid, to);
                    if let Some(id) = receipt.id {
                        if let Err(e) = self
                            .store
                            .update(&ledger_path, json!({ "deliveredId": id }))
                            .await
                        {
                            warn!("could not record delivery id for job {}: {}", job_id, e);
                        }
                    }
                    sleep(self.settings.send_delay).await;
                }
                Err(e) => {
                    error!("send failed for job {} (uid={}): {}", job_id, uid, e);
                    // Release the reservation so a later run retries.
                    if let Err(e) = self.store.remove(&ledger_path).await {
                        error!("could not release reservation for job {}: {}", job_id, e);
                    }
                }
            }
        }

        if attempted > 0 {
            self.send_user_summary(user, attempted, &wanted, mailer);
        }

        Ok(RunSummary {
            attempted,
            labels_used: wanted,
        })
    }

    /// Best-effort candidate summary, detached from the run's result.
    fn send_user_summary(
        &self,
        user: &UserProfile,
        attempted: u32,
        labels: &[RoleLabel],
        mailer: Arc<dyn Mailer>,
    ) {
        let Some(to) = user.summary_address() else {
            return;
        };
        let email = OutboundEmail {
            from: self.settings.from_email.clone(),
            to: to.to_string(),
            subject: emails::summary_subject(),
            html: emails::summary_html(&self.settings.brand_base_url, user, attempted, labels),
        };
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&email).await {
                debug!("summary email failed (ignored): {}", e);
            }
        });
    }

    /// Scheduled entry point: apply for every user with a non-empty
    /// preference set, strictly sequentially with inter-user pacing.
    pub async fn sweep(&self) -> Result<SweepSummary, ServiceError> {
        let mailer = self.mailer()?;
        let users = self.store.list(paths::USERS_PREFIX).await?;

        let mut summary = SweepSummary {
            users: 0,
            attempted: 0,
        };
        for (path, value) in users {
            let uid = path.strip_prefix(paths::USERS_PREFIX).unwrap_or(&path).to_string();
            let user: UserProfile = match serde_json::from_value(value) {
                Ok(user) => user,
                Err(e) => {
                    warn!("skipping unreadable user {}: {}", uid, e);
                    continue;
                }
            };
            let wanted = self.clamp_labels(&user.selected_title_tags);
            if wanted.is_empty() {
                continue;
            }
            match self.run_apply(&uid, &user, wanted, mailer.clone()).await {
                Ok(run) => {
                    summary.users += 1;
                    summary.attempted += run.attempted;
                }
                Err(e) => {
                    // One user's failure never aborts the sweep.
                    error!("sweep run failed for uid={}: {}", uid, e);
                }
            }
            sleep(self.settings.user_delay).await;
        }
        info!(
            "sweep finished: {} users, {} applications attempted",
            summary.users, summary.attempted
        );
        Ok(summary)
    }

    /// Tagging pass: walk the first N postings and cache a classification
    /// for any that lack one. Returns how many postings were tagged.
    pub async fn categorize(&self, limit: Option<usize>) -> Result<u32, ServiceError> {
        let limit = limit.unwrap_or(self.settings.categorize_batch_limit);
        let jobs = self.store.list(paths::JOBS_PREFIX).await?;

        let mut updated: u32 = 0;
        for (path, value) in jobs.into_iter().take(limit) {
            let job_id = path.strip_prefix(paths::JOBS_PREFIX).unwrap_or(&path);
            let job: JobPosting = match serde_json::from_value(value) {
                Ok(job) => job,
                Err(e) => {
                    warn!("skipping unreadable job {}: {}", job_id, e);
                    continue;
                }
            };
            if job.cached_tag().is_some() {
                continue;
            }
            if classify_and_cache(job_id, &job, self.suggester.as_ref(), self.store.as_ref())
                .await
                .is_some()
            {
                updated += 1;
                sleep(self.settings.categorize_delay).await;
            }
        }
        info!("categorize pass tagged {} postings", updated);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::document_store::testing::MemoryStore;
    use crate::enhance::DisabledSuggester;
    use crate::mailer::testing::MockMailer;

    fn settings() -> ApplySettings {
        ApplySettings {
            from_email: "ApplyStorm <team@sojobless.live>".to_string(),
            brand_base_url: "https://sojobless.live".to_string(),
            max_title_tags: 3,
            send_delay: Duration::from_millis(0),
            user_delay: Duration::from_millis(0),
            categorize_delay: Duration::from_millis(0),
            run_deadline: Duration::from_secs(60),
            categorize_batch_limit: 200,
        }
    }

    async fn seed_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                "users/u1",
                json!({
                    "fullName": "Sara",
                    "email": "sara@inbox.com",
                    "selectedTitleTags": ["electrician"]
                }),
            )
            .await
            .unwrap();
        store
            .set(
                "jobs/j1",
                json!({ "title": "Senior Electrician Needed", "email": "hr@acme.com" }),
            )
            .await
            .unwrap();
        store
            .set(
                "jobs/j2",
                json!({ "title": "Electrician helper", "contactEmail": "jobs@volt.com" }),
            )
            .await
            .unwrap();
        store
            .set(
                "jobs/j3",
                json!({ "title": "Head Chef", "email": "chef@resto.com" }),
            )
            .await
            .unwrap();
        store
    }

    fn service(store: Arc<MemoryStore>, mailer: Arc<MockMailer>) -> ApplyService {
        ApplyService::new(
            store,
            Some(mailer),
            Arc::new(DisabledSuggester),
            settings(),
        )
    }

    fn service_with(
        store: Arc<MemoryStore>,
        mailer: Arc<MockMailer>,
        settings: ApplySettings,
    ) -> ApplyService {
        ApplyService::new(store, Some(mailer), Arc::new(DisabledSuggester), settings)
    }

    async fn settle() {
        // Let detached summary tasks run on the test runtime.
        sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn applies_to_matching_jobs_and_records_ledger() {
        let store = seed_store().await;
        let mailer = Arc::new(MockMailer::new());
        let svc = service(store.clone(), mailer.clone());

        let run = svc.apply_now("u1", &["electrician".to_string()]).await.unwrap();
        settle().await;

        assert_eq!(run.attempted, 2);
        assert!(store.contains("applyLog/u1/j1"));
        assert!(store.contains("applyLog/u1/j2"));
        assert!(!store.contains("applyLog/u1/j3"));

        let entry = store.get("applyLog/u1/j1").await.unwrap().unwrap();
        assert_eq!(entry["to"], "hr@acme.com");
        assert_eq!(entry["title"], "Senior Electrician Needed");
        assert!(entry["deliveredId"].is_string());

        // Employer sends plus the candidate summary.
        let sent = mailer.sent_to();
        assert!(sent.contains(&"hr@acme.com".to_string()));
        assert!(sent.contains(&"jobs@volt.com".to_string()));
        assert!(sent.contains(&"sara@inbox.com".to_string()));
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let store = seed_store().await;
        let mailer = Arc::new(MockMailer::new());
        let svc = service(store.clone(), mailer.clone());

        let first = svc.apply_now("u1", &["electrician".to_string()]).await.unwrap();
        let second = svc.apply_now("u1", &["electrician".to_string()]).await.unwrap();
        settle().await;

        assert_eq!(first.attempted, 2);
        assert_eq!(second.attempted, 0);
    }

    #[tokio::test]
    async fn existing_ledger_entry_skips_only_that_job() {
        let store = seed_store().await;
        store
            .set("applyLog/u1/j1", json!({ "ts": 1, "to": "hr@acme.com", "title": "x" }))
            .await
            .unwrap();
        let mailer = Arc::new(MockMailer::new());
        let svc = service(store.clone(), mailer.clone());

        let run = svc.apply_now("u1", &["electrician".to_string()]).await.unwrap();
        settle().await;

        assert_eq!(run.attempted, 1);
        assert!(!mailer.sent_to().contains(&"hr@acme.com".to_string()));
        assert!(mailer.sent_to().contains(&"jobs@volt.com".to_string()));
    }

    #[tokio::test]
    async fn matching_job_without_contact_is_skipped_and_not_ledgered() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("users/u1", json!({ "selectedTitleTags": ["electrician"] }))
            .await
            .unwrap();
        store
            .set("jobs/j1", json!({ "title": "Senior Electrician Needed" }))
            .await
            .unwrap();
        let mailer = Arc::new(MockMailer::new());
        let svc = service(store.clone(), mailer.clone());

        let run = svc.apply_now("u1", &["electrician".to_string()]).await.unwrap();

        assert_eq!(run.attempted, 0);
        assert!(!store.contains("applyLog/u1/j1"));
        assert!(mailer.sent_to().is_empty());
    }

    #[tokio::test]
    async fn failed_send_releases_reservation_for_retry() {
        let store = seed_store().await;
        let mailer = Arc::new(MockMailer::failing_for(&["hr@acme.com"]));
        let svc = service(store.clone(), mailer.clone());

        let run = svc.apply_now("u1", &["electrician".to_string()]).await.unwrap();
        settle().await;
        assert_eq!(run.attempted, 1);
        assert!(!store.contains("applyLog/u1/j1"));
        assert!(store.contains("applyLog/u1/j2"));

        // A later run with a healthy mailer picks the failed job back up.
        let mailer2 = Arc::new(MockMailer::new());
        let svc2 = service(store.clone(), mailer2.clone());
        let rerun = svc2.apply_now("u1", &["electrician".to_string()]).await.unwrap();
        settle().await;
        assert_eq!(rerun.attempted, 1);
        assert!(store.contains("applyLog/u1/j1"));
    }

    #[tokio::test]
    async fn oversized_preference_set_is_clamped_to_three() {
        let store = seed_store().await;
        let mailer = Arc::new(MockMailer::new());
        let svc = service(store, mailer);

        let tags: Vec<String> = ["nurse", "baker", "mason", "welder", "electrician"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let run = svc.apply_now("u1", &tags).await.unwrap();
        settle().await;

        assert_eq!(run.labels_used.len(), 3);
        // "electrician" was truncated away, so nothing matched.
        assert_eq!(run.attempted, 0);
    }

    #[tokio::test]
    async fn deadline_exhaustion_returns_partial_summary() {
        let store = seed_store().await;
        let mailer = Arc::new(MockMailer::new());
        let mut s = settings();
        s.run_deadline = Duration::from_secs(0);
        let svc = service_with(store.clone(), mailer.clone(), s);

        let run = svc.apply_now("u1", &["electrician".to_string()]).await.unwrap();
        assert_eq!(run.attempted, 0);
        assert!(mailer.sent_to().is_empty());
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store, Arc::new(MockMailer::new()));
        match svc.apply_now("ghost", &["nurse".to_string()]).await {
            Err(ServiceError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|r| r.attempted)),
        }
    }

    #[tokio::test]
    async fn missing_mailer_credential_short_circuits() {
        let store = seed_store().await;
        let svc = ApplyService::new(store, None, Arc::new(DisabledSuggester), settings());
        match svc.apply_now("u1", &["electrician".to_string()]).await {
            Err(ServiceError::Configuration(msg)) => assert!(msg.contains("RESEND_API_KEY")),
            other => panic!("expected Configuration, got {:?}", other.map(|r| r.attempted)),
        }
    }

    #[tokio::test]
    async fn no_summary_email_when_nothing_attempted() {
        let store = seed_store().await;
        let mailer = Arc::new(MockMailer::new());
        let svc = service(store, mailer.clone());

        let run = svc.apply_now("u1", &["nurse".to_string()]).await.unwrap();
        settle().await;

        assert_eq!(run.attempted, 0);
        assert!(!mailer.sent_to().contains(&"sara@inbox.com".to_string()));
    }

    #[tokio::test]
    async fn sweep_processes_only_users_with_preferences() {
        let store = seed_store().await;
        store
            .set("users/u2", json!({ "email": "idle@inbox.com", "selectedTitleTags": [] }))
            .await
            .unwrap();
        store
            .set(
                "users/u3",
                json!({ "email": "cook@inbox.com", "selectedTitleTags": ["chef"] }),
            )
            .await
            .unwrap();
        let mailer = Arc::new(MockMailer::new());
        let svc = service(store, mailer.clone());

        let summary = svc.sweep().await.unwrap();
        settle().await;

        assert_eq!(summary.users, 2);
        // u1 matches j1+j2, u3 matches j3.
        assert_eq!(summary.attempted, 3);
        assert!(mailer.sent_to().contains(&"chef@resto.com".to_string()));
    }

    #[tokio::test]
    async fn categorize_tags_untagged_postings_via_rules() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("jobs/j1", json!({ "title": "Welder wanted" }))
            .await
            .unwrap();
        store
            .set(
                "jobs/j2",
                json!({ "title": "anything", "classification": { "tag": "chef" } }),
            )
            .await
            .unwrap();
        store
            .set("jobs/j3", json!({ "title": "nothing matches here at all" }))
            .await
            .unwrap();
        let svc = service(store.clone(), Arc::new(MockMailer::new()));

        let updated = svc.categorize(None).await.unwrap();
        assert_eq!(updated, 1);

        let doc = store.get("jobs/j1").await.unwrap().unwrap();
        assert_eq!(doc["classification"]["tag"], "welder");
        assert_eq!(doc["classification"]["source"], "rules");
    }
}
