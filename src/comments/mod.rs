use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{auth::utils::validate_not_blank, users::AuthorResponse};

pub mod handler;

/// Database model for a comment
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Request payload for creating or editing a comment
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CommentBody {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    #[validate(custom(function = "validate_not_blank", message = "Comment must not be blank"))]
    pub content: String,
}

/// Response structure for a comment with author info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: AuthorResponse,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Comment ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    #[default]
    Oldest,
    Latest,
}

/// Query parameters for fetching comments
#[derive(Debug, Deserialize)]
pub struct CommentFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<CommentSort>,
}

/// Response for paginated comments list
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentsListResponse {
    pub comments: Vec<CommentResponse>,
    pub total: i64,
    pub has_more: bool,
}
