use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{auth::utils::validate_not_blank, users::AuthorResponse};

pub mod handler;

/// Database model for a post
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: i32,
    pub comment_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Request payload for creating a post. Text, an image, or both.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_post_body"))]
pub struct CreatePost {
    #[serde(default)]
    #[validate(length(max = 2000, message = "Post must be at most 2000 characters"))]
    pub content: String,
    #[validate(url(message = "Image must be a URL"))]
    pub image_url: Option<String>,
}

fn validate_post_body(post: &CreatePost) -> Result<(), ValidationError> {
    let has_text = !post.content.trim().is_empty();
    let has_image = post
        .image_url
        .as_deref()
        .is_some_and(|url| !url.trim().is_empty());
    if has_text || has_image {
        Ok(())
    } else {
        Err(ValidationError::new("empty_post").with_message("Post needs text or an image".into()))
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdatePost {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Post must be between 1 and 2000 characters"
    ))]
    #[validate(custom(function = "validate_not_blank", message = "Post must not be blank"))]
    pub content: String,
}

/// A post as rendered to a viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub author: AuthorResponse,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: i64,
    pub comment_count: i64,
    /// Whether the current viewer likes this post
    pub liked_by_me: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Which posts a feed shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedScope {
    #[default]
    All,
    /// The viewer's own posts and posts of users they follow
    Following,
}

impl FeedScope {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedScope::All => "all",
            FeedScope::Following => "following",
        }
    }
}

/// Query parameters for the feed
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub scope: Option<FeedScope>,
    pub author: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for a page of posts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListResponse {
    pub posts: Vec<PostResponse>,
    pub total: i64,
    pub has_more: bool,
}

/// Response for like toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeActionResponse {
    pub liked: bool,
    pub like_count: i64,
}

/// Users who liked a post
#[derive(Debug, Serialize, Deserialize)]
pub struct LikersResponse {
    pub users: Vec<AuthorResponse>,
    pub total: i64,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_needs_text_or_image() {
        let empty = CreatePost {
            content: "   ".to_string(),
            image_url: None,
        };
        assert!(empty.validate().is_err());

        let text = CreatePost {
            content: "hello".to_string(),
            image_url: None,
        };
        assert!(text.validate().is_ok());

        let image = CreatePost {
            content: String::new(),
            image_url: Some("https://cdn.threadup.app/uploads/a.jpg".to_string()),
        };
        assert!(image.validate().is_ok());
    }

    #[test]
    fn post_length_is_capped() {
        let long = CreatePost {
            content: "a".repeat(2001),
            image_url: None,
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn blank_edit_is_rejected() {
        let blank = UpdatePost {
            content: " \t ".to_string(),
        };
        assert!(blank.validate().is_err());

        let edit = UpdatePost {
            content: "edited".to_string(),
        };
        assert!(edit.validate().is_ok());
    }

    #[test]
    fn create_post_defaults_missing_content() {
        let post: CreatePost =
            serde_json::from_str(r#"{"image_url":"https://x.test/a.jpg"}"#).unwrap();
        assert_eq!(post.content, "");
        assert!(post.validate().is_ok());
    }

    #[test]
    fn feed_scope_parses_lowercase() {
        let scope: FeedScope = serde_json::from_str("\"following\"").unwrap();
        assert_eq!(scope, FeedScope::Following);
        assert_eq!(FeedScope::default(), FeedScope::All);
    }
}
