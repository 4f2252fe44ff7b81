use crate::classify::{classify, normalize};
use crate::db::models::JobPosting;
use crate::taxonomy::{taxonomy, RoleLabel};

/// Whether a posting matches any of the user's wanted labels.
///
/// Two paths, deliberately unioned: the posting's classification (cached tag
/// or rule result) being wanted, or any wanted label's own patterns firing
/// on the raw text. The second path lets a broad preference catch postings
/// whose cached tag names a different role. Empty `wanted` matches nothing.
pub fn matches(job: &JobPosting, wanted: &[RoleLabel]) -> bool {
    if wanted.is_empty() {
        return false;
    }

    if let Some(label) = classify(job) {
        if wanted.contains(&label) {
            return true;
        }
    }

    let text = normalize(job);
    wanted.iter().any(|label| {
        taxonomy()
            .rules_for(label)
            .is_some_and(|rules| rules.iter().any(|r| r.is_match(&text)))
    })
}
