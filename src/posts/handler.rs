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
    config::settings::Settings,
    error::AppError,
    posts::{
        CreatePost, FeedQuery, FeedScope, LikeActionResponse, LikersResponse, Post,
        PostListResponse, PostResponse, UpdatePost,
    },
    response::{ApiResponse, PageQuery},
    uploads,
    users::AuthorResponse,
};

/// Helper struct for fetching posts with author info and the viewer's like
#[derive(FromRow)]
struct PostFromDb {
    id: Uuid,
    content: String,
    image_url: Option<String>,
    like_count: i32,
    comment_count: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    // author fields
    author_id: Uuid,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    liked_by_me: bool,
}

impl From<PostFromDb> for PostResponse {
    fn from(p: PostFromDb) -> Self {
        PostResponse {
            id: p.id,
            author: AuthorResponse {
                id: p.author_id,
                username: p.username,
                first_name: p.first_name,
                last_name: p.last_name,
                avatar_url: p.avatar_url,
            },
            content: p.content,
            image_url: p.image_url,
            like_count: p.like_count as i64,
            comment_count: p.comment_count as i64,
            liked_by_me: p.liked_by_me,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

// $1 is always the viewer (NULL when anonymous)
const POST_SELECT: &str = r#"
    SELECT
        p.id, p.content, p.image_url, p.like_count, p.comment_count,
        p.created_at, p.updated_at,
        u.id AS author_id, u.username, u.first_name, u.last_name, u.avatar_url,
        EXISTS(
            SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = $1
        ) AS liked_by_me
    FROM posts p
    JOIN users u ON p.author_id = u.id
"#;

/// Feed filter for a scope; $1 = viewer, $2 = optional author.
fn feed_where(scope: FeedScope) -> &'static str {
    match scope {
        FeedScope::All => "WHERE ($2::uuid IS NULL OR p.author_id = $2)",
        FeedScope::Following => {
            r#"WHERE ($2::uuid IS NULL OR p.author_id = $2)
               AND (p.author_id = $1
                    OR p.author_id IN (SELECT following_id FROM follows WHERE follower_id = $1))"#
        }
    }
}

/// Create a post
/// POST /api/posts
pub async fn create_post(
    State(pool): State<PgPool>,
    State(settings): State<Settings>,
    claims: jwt::Claims,
    Json(payload): Json<CreatePost>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let image_url = payload
        .image_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    if let Some(url) = &image_url {
        uploads::handler::ensure_own_image(&settings, url, claims.sub)?;
    }

    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (author_id, content, image_url)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(claims.sub)
    .bind(payload.content.trim())
    .bind(&image_url)
    .fetch_one(&pool)
    .await?;

    tracing::debug!(post_id = %post.id, author_id = %post.author_id, "post created");

    let response = fetch_post(&pool, post.id, Some(claims.sub)).await?;
    Ok(ApiResponse::success(response).created())
}

/// Paginated feed, newest first
/// GET /api/posts?scope=all|following&author=&limit=&offset=
pub async fn get_feed(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Query(filter): Query<FeedQuery>,
) -> Result<impl IntoResponse, AppError> {
    let scope = filter.scope.unwrap_or_default();
    let viewer = claims.map(|c| c.sub);

    if scope == FeedScope::Following && viewer.is_none() {
        return Err(AppError::Unauthorized);
    }

    let (limit, offset) = PageQuery {
        limit: filter.limit,
        offset: filter.offset,
    }
    .resolve(20, 100);

    let where_clause = feed_where(scope);

    let total_row = sqlx::query(&format!(
        "SELECT COUNT(*) AS count FROM posts p {}",
        where_clause
    ))
    .bind(viewer)
    .bind(filter.author)
    .fetch_one(&pool)
    .await?;
    let total: i64 = total_row.get("count");

    let query_str = format!(
        "{} {} ORDER BY p.created_at DESC, p.id DESC LIMIT $3 OFFSET $4",
        POST_SELECT, where_clause
    );

    let rows = sqlx::query_as::<_, PostFromDb>(&query_str)
        .bind(viewer)
        .bind(filter.author)
        .bind(limit)
        .bind(offset)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Feed error ({}): {:?}", scope.as_str(), e);
            AppError::InternalServerError
        })?;

    let posts: Vec<PostResponse> = rows.into_iter().map(PostResponse::from).collect();
    let has_more = offset + (posts.len() as i64) < total;

    Ok(ApiResponse::success(PostListResponse {
        posts,
        total,
        has_more,
    }))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let post = fetch_post(&pool, id, claims.map(|c| c.sub)).await?;
    Ok(ApiResponse::success(post))
}

/// Edit the text of a post (author only)
/// PUT /api/posts/:id
pub async fn update_post(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePost>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let author_id = post_author(&pool, id).await?;
    if author_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only edit your own posts".to_string(),
        ));
    }

    sqlx::query("UPDATE posts SET content = $1, updated_at = NOW() WHERE id = $2")
        .bind(payload.content.trim())
        .bind(id)
        .execute(&pool)
        .await?;

    let post = fetch_post(&pool, id, Some(claims.sub)).await?;
    Ok(ApiResponse::success(post))
}

/// Delete a post (author only). Likes and comments go with it.
/// DELETE /api/posts/:id
pub async fn delete_post(
    State(pool): State<PgPool>,
    State(settings): State<Settings>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let row = sqlx::query("SELECT author_id, image_url FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let author_id: Uuid = row.get("author_id");
    let image_url: Option<String> = row.get("image_url");

    if author_id != claims.sub {
        return Err(AppError::Forbidden(
            "You can only delete your own posts".to_string(),
        ));
    }

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if let Some(url) = image_url {
        uploads::handler::remove_stored_image(&settings, &url, author_id).await;
    }

    Ok(ApiResponse::ok("Post deleted"))
}

/// Toggle the viewer's like on a post
/// POST /api/posts/:id/like
pub async fn toggle_like(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    // Unlike if a like exists, otherwise like. The trigger keeps like_count.
    let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
        .bind(id)
        .bind(claims.sub)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let liked = if removed == 0 {
        sqlx::query(
            "INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(claims.sub)
        .execute(&mut *tx)
        .await?;
        true
    } else {
        false
    };

    let count_row = sqlx::query("SELECT like_count FROM posts WHERE id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    let like_count: i32 = count_row.get("like_count");

    tx.commit().await?;

    Ok(ApiResponse::success(LikeActionResponse {
        liked,
        like_count: like_count as i64,
    }))
}

#[derive(FromRow)]
struct LikerRow {
    id: Uuid,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

/// Users who liked a post, most recent first
/// GET /api/posts/:id/likes
pub async fn get_post_likes(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let row = sqlx::query("SELECT like_count FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;
    let total: i32 = row.get("like_count");
    let total = total as i64;

    let (limit, offset) = page.resolve(20, 100);

    let rows = sqlx::query_as::<_, LikerRow>(
        r#"
        SELECT u.id, u.username, u.first_name, u.last_name, u.avatar_url
        FROM post_likes l
        JOIN users u ON l.user_id = u.id
        WHERE l.post_id = $1
        ORDER BY l.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&pool)
    .await?;

    let users: Vec<AuthorResponse> = rows
        .into_iter()
        .map(|u| AuthorResponse {
            id: u.id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            avatar_url: u.avatar_url,
        })
        .collect();
    let has_more = (offset + limit) < total;

    Ok(ApiResponse::success(LikersResponse {
        users,
        total,
        has_more,
    }))
}

/// Author of a post, or 404.
pub(crate) async fn post_author(pool: &PgPool, post_id: Uuid) -> Result<Uuid, AppError> {
    let row = sqlx::query("SELECT author_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(row.get("author_id"))
}

/// Helper function to fetch a single post as seen by `viewer`
async fn fetch_post(
    pool: &PgPool,
    post_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<PostResponse, AppError> {
    let query_str = format!("{} WHERE p.id = $2", POST_SELECT);

    let row = sqlx::query_as::<_, PostFromDb>(&query_str)
        .bind(viewer)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(PostResponse::from(row))
}
