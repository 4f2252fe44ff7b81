use serde::Deserialize;
use validator::Validate;

/// Body of the manual apply trigger
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyNowRequest {
    #[validate(length(min = 1, message = "uid is required"))]
    pub uid: String,

    #[validate(length(min = 1, message = "titleTags must not be empty"))]
    pub title_tags: Vec<String>,
}

/// Query of the categorize trigger
#[derive(Debug, Deserialize)]
pub struct CategorizeQuery {
    pub limit: Option<usize>,
}
