use chrono::Utc;

use crate::db::models::{JobPosting, UserProfile};
use crate::taxonomy::RoleLabel;

const PRIMARY: &str = "#fd2f4b";

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn application_subject(user: &UserProfile, job: &JobPosting) -> String {
    format!(
        "Application — {} for {}",
        user.full_name
            .as_deref()
            .or(user.email.as_deref())
            .unwrap_or("Candidate"),
        job.display_title()
    )
}

/// Employer-facing application email: candidate card with name, profession,
/// blurb and a CV button, inline styles only.
pub fn application_html(brand_url: &str, user: &UserProfile, job: &JobPosting) -> String {
    let logo = format!("{brand_url}/logo.png");
    let name = escape_html(user.display_name());
    let role = escape_html(job.display_title());
    let profession = user
        .profession
        .as_deref()
        .map(|p| {
            format!(
                r#"<div style="font-size:1.2rem;font-weight:700;color:#222;margin-bottom:8px;">{}</div>"#,
                escape_html(p)
            )
        })
        .unwrap_or_default();
    let about = user
        .about
        .as_deref()
        .map(|a| {
            format!(
                r#"<div style="color:#444;font-size:1.06rem;line-height:1.6;margin:0 auto 26px auto;max-width:320px;">{}</div>"#,
                escape_html(a)
            )
        })
        .unwrap_or_default();
    let photo = user
        .profile_image_url
        .as_deref()
        .map(|p| {
            format!(
                r#"<img src="{}" style="width:100px;height:100px;border-radius:50%;margin-bottom:18px;object-fit:cover;">"#,
                escape_html(p)
            )
        })
        .unwrap_or_default();
    let cv = user
        .user_cv
        .as_deref()
        .map(|url| {
            format!(
                r#"<a href="{}" style="display:inline-block;background:{PRIMARY};color:#fff;font-weight:700;padding:13px 28px;font-size:1.12rem;border-radius:8px;text-decoration:none;" target="_blank" rel="noopener">View CV</a>"#,
                escape_html(url)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<div style="font-family:'Inter',Arial,sans-serif;background:#f8fafc;padding:36px 0 12px 0;text-align:center;">
  <div style="margin-bottom:20px;"><img src="{logo}" alt="ApplyStorm" style="height:48px;width:auto;"></div>
  <div style="background:#fff;border-radius:18px;max-width:440px;margin:0 auto;padding:44px 28px 34px 28px;">
    {photo}
    <h2 style="margin:0 0 16px 0;font-size:1.6rem;font-weight:900;color:#111;">Application for: <span style="color:{PRIMARY};">{role}</span></h2>
    <h1 style="margin:10px 0 4px 0;font-size:2.1rem;font-weight:900;color:{PRIMARY};">{name}</h1>
    {profession}
    {about}
    {cv}
  </div>
  <div style="margin-top:36px;color:#999;font-size:0.99rem;">
    Sent by <span style="color:{PRIMARY};font-weight:700;">ApplyStorm</span> · <a href="{brand}" style="color:{PRIMARY};text-decoration:none;">{brand}</a>
  </div>
</div>"#,
        brand = escape_html(brand_url),
    )
}

pub fn summary_subject() -> String {
    "Today’s ApplyStorm Auto-Apply Summary".to_string()
}

/// Candidate-facing summary: big attempted count, roles targeted, dated.
pub fn summary_html(
    brand_url: &str,
    user: &UserProfile,
    attempted: u32,
    labels: &[RoleLabel],
) -> String {
    let logo = format!("{brand_url}/logo.png");
    let name = user
        .full_name
        .as_deref()
        .map(|n| format!(", {}", escape_html(n)))
        .unwrap_or_default();
    let plural = if attempted == 1 { "" } else { "s" };
    let roles = if labels.is_empty() {
        String::new()
    } else {
        let joined = labels
            .iter()
            .map(|l| escape_html(l.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            r#"<div style="font-size:0.95rem;color:#444;margin:0 auto 4px;max-width:420px;">Roles targeted: <strong>{joined}</strong></div>"#
        )
    };
    let today = Utc::now().format("%B %-d, %Y");

    format!(
        r#"<div style="font-family:'Inter',Arial,sans-serif;background:#f8fafc;padding:36px 0 12px 0;text-align:center;">
  <div style="margin-bottom:16px;"><img src="{logo}" alt="ApplyStorm" style="height:40px;width:auto;"></div>
  <div style="background:#fff;border-radius:18px;max-width:560px;margin:0 auto;padding:28px 28px 24px;">
    <div style="font-size:0.95rem;color:#666;margin-bottom:8px;">Auto-Apply Summary · {today}</div>
    <div style="font-size:2.2rem;font-weight:900;color:{PRIMARY};line-height:1;margin-bottom:10px;">{attempted}</div>
    <div style="font-size:1rem;color:#111;margin-bottom:14px;">job{plural} applied for you today{name}.</div>
    {roles}
    <div style="font-size:0.88rem;color:#888;margin-top:8px;">We’ll keep matching and applying as new jobs arrive.</div>
  </div>
</div>"#
    )
}
