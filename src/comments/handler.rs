use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::jwt,
    comments::{Comment, CommentBody, CommentFilter, CommentResponse, CommentSort, CommentsListResponse},
    error::AppError,
    posts::handler::post_author,
    response::{ApiResponse, PageQuery},
    users::AuthorResponse,
};

/// Helper struct for fetching comments with author info from database
#[derive(FromRow)]
struct CommentFromDb {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    // Author fields
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<CommentFromDb> for CommentResponse {
    fn from(c: CommentFromDb) -> Self {
        CommentResponse {
            id: c.id,
            post_id: c.post_id,
            author: AuthorResponse {
                id: c.author_id,
                username: c.username,
                first_name: c.first_name,
                last_name: c.last_name,
                avatar_url: c.avatar_url,
            },
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

const COMMENT_SELECT: &str = r#"
    SELECT
        c.id, c.post_id, c.author_id, c.content, c.created_at, c.updated_at,
        u.username, u.first_name, u.last_name, u.avatar_url
    FROM comments c
    JOIN users u ON c.author_id = u.id
"#;

/// Create a new comment on a post
/// POST /api/posts/:id/comments
pub async fn create_comment(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(post_id): Path<Uuid>,
    Json(payload): Json<CommentBody>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    // Verify post exists
    post_author(&pool, post_id).await?;

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, author_id, content)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(post_id)
    .bind(claims.sub)
    .bind(payload.content.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::InternalServerError
    })?;

    let response = fetch_comment(&pool, comment.id).await?;
    Ok(ApiResponse::success(response).created())
}

/// Get comments for a post
/// GET /api/posts/:id/comments
pub async fn get_post_comments(
    State(pool): State<PgPool>,
    Path(post_id): Path<Uuid>,
    Query(filter): Query<CommentFilter>,
) -> Result<impl IntoResponse, AppError> {
    let row = sqlx::query("SELECT comment_count FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;
    let total: i32 = row.get("comment_count");
    let total = total as i64;

    let (limit, offset) = PageQuery {
        limit: filter.limit,
        offset: filter.offset,
    }
    .resolve(20, 100);

    let order_clause = match filter.sort.unwrap_or_default() {
        CommentSort::Oldest => "c.created_at ASC, c.id ASC",
        CommentSort::Latest => "c.created_at DESC, c.id DESC",
    };

    let query_str = format!(
        "{} WHERE c.post_id = $1 ORDER BY {} LIMIT $2 OFFSET $3",
        COMMENT_SELECT, order_clause
    );

    let comments = sqlx::query_as::<_, CommentFromDb>(&query_str)
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch comments: {:?}", e);
            AppError::InternalServerError
        })?;

    let comments: Vec<CommentResponse> =
        comments.into_iter().map(CommentResponse::from).collect();
    let has_more = offset + (comments.len() as i64) < total;

    Ok(ApiResponse::success(CommentsListResponse {
        comments,
        total,
        has_more,
    }))
}

/// Update a comment (author only)
/// PUT /api/comments/:id
pub async fn update_comment(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(comment_id): Path<Uuid>,
    Json(payload): Json<CommentBody>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let row = sqlx::query("SELECT author_id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    let author_id: Uuid = row.get("author_id");
    if author_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only edit your own comments".to_string(),
        ));
    }

    sqlx::query("UPDATE comments SET content = $1, updated_at = NOW() WHERE id = $2")
        .bind(payload.content.trim())
        .bind(comment_id)
        .execute(&pool)
        .await?;

    let response = fetch_comment(&pool, comment_id).await?;
    Ok(ApiResponse::success(response))
}

/// Delete a comment. Allowed for the comment author and the post author.
/// DELETE /api/comments/:id
pub async fn delete_comment(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let row = sqlx::query(
        r#"
        SELECT c.author_id, p.author_id AS post_author_id
        FROM comments c
        JOIN posts p ON c.post_id = p.id
        WHERE c.id = $1
        "#,
    )
    .bind(comment_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    let author_id: Uuid = row.get("author_id");
    let post_author_id: Uuid = row.get("post_author_id");

    if !can_delete_comment(claims.sub, author_id, post_author_id) {
        return Err(AppError::Forbidden(
            "You cannot delete this comment".to_string(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(&pool)
        .await?;

    Ok(ApiResponse::ok("Comment deleted"))
}

fn can_delete_comment(viewer: Uuid, comment_author: Uuid, post_author: Uuid) -> bool {
    viewer == comment_author || viewer == post_author
}

/// Helper function to fetch a single comment with full details
async fn fetch_comment(pool: &PgPool, comment_id: Uuid) -> Result<CommentResponse, AppError> {
    let query_str = format!("{} WHERE c.id = $1", COMMENT_SELECT);

    let comment = sqlx::query_as::<_, CommentFromDb>(&query_str)
        .bind(comment_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    Ok(CommentResponse::from(comment))
}
