use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::AuthorResponse;

pub mod handler;

/// Response for a user in followers/following lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUserResponse {
    #[serde(flatten)]
    pub user: AuthorResponse,
    pub bio: Option<String>,
    /// Whether the current viewer follows this user
    pub is_following: bool,
    pub followed_at: chrono::DateTime<chrono::Utc>,
}

/// Response for paginated followers/following lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowListResponse {
    pub users: Vec<FollowUserResponse>,
    pub total: i64,
    pub has_more: bool,
}

/// Response for follow/unfollow actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowActionResponse {
    pub following: bool,
    /// Followers of the target user
    pub followers_count: i64,
    /// Users the viewer follows
    pub following_count: i64,
}

/// Request payload for bulk follow status check
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkFollowCheckRequest {
    pub user_ids: Vec<Uuid>,
}

/// A suggested account, as shown on suggestion cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowSuggestionResponse {
    #[serde(flatten)]
    pub user: AuthorResponse,
    pub bio: Option<String>,
    pub followers_count: i64,
    pub mutual_followers_count: i64,
}

/// Query parameters for suggestions
#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    pub limit: Option<i64>,
}

/// Merge mutual-connection suggestions with popular accounts, keeping the
/// mutual ranking first and never repeating a user.
pub fn merge_suggestions(
    mutual: Vec<FollowSuggestionResponse>,
    popular: Vec<FollowSuggestionResponse>,
    limit: usize,
) -> Vec<FollowSuggestionResponse> {
    let mut merged: Vec<FollowSuggestionResponse> = Vec::with_capacity(limit);
    for s in mutual.into_iter().chain(popular) {
        if merged.len() == limit {
            break;
        }
        if !merged.iter().any(|m| m.user.id == s.user.id) {
            merged.push(s);
        }
    }
    merged
}
