use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::{
    auth::jwt,
    error::AppError,
    follows::{
        merge_suggestions, BulkFollowCheckRequest, FollowActionResponse, FollowListResponse,
        FollowSuggestionResponse, FollowUserResponse, SuggestionQuery,
    },
    response::{ApiResponse, PageQuery},
    users::AuthorResponse,
};

/// Helper struct for fetching user with follow info
#[derive(FromRow)]
struct UserFollowRow {
    id: Uuid,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    is_following: bool,
    followed_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserFollowRow> for FollowUserResponse {
    fn from(u: UserFollowRow) -> Self {
        FollowUserResponse {
            user: AuthorResponse {
                id: u.id,
                username: u.username,
                first_name: u.first_name,
                last_name: u.last_name,
                avatar_url: u.avatar_url,
            },
            bio: u.bio,
            is_following: u.is_following,
            followed_at: u.followed_at,
        }
    }
}

/// Which side of the relation a list shows
#[derive(Clone, Copy)]
enum Direction {
    Followers,
    Following,
}

/// Toggle following a user
/// POST /api/users/:id/follow
pub async fn toggle_follow(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if claims.sub == user_id {
        return Err(AppError::UnprocessableEntity(
            "You cannot follow yourself".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    ensure_user_exists(&mut tx, user_id).await?;

    // The trigger keeps followers_count/following_count in sync
    let removed = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(claims.sub)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let following = if removed == 0 {
        sqlx::query(
            r#"
            INSERT INTO follows (follower_id, following_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, following_id) DO NOTHING
            "#,
        )
        .bind(claims.sub)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        true
    } else {
        false
    };

    let response = follow_counts(&mut tx, following, user_id, claims.sub).await?;
    tx.commit().await?;

    tracing::debug!(follower = %claims.sub, target = %user_id, following, "follow toggled");

    Ok(ApiResponse::success(response))
}

/// Unfollow a user; a no-op when not following
/// DELETE /api/users/:id/follow
pub async fn unfollow_user(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;
    ensure_user_exists(&mut tx, user_id).await?;

    sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(claims.sub)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let response = follow_counts(&mut tx, false, user_id, claims.sub).await?;
    tx.commit().await?;

    Ok(ApiResponse::success(response))
}

/// Get a user's followers
/// GET /api/users/:id/followers
pub async fn get_followers(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let list = follow_list(
        &pool,
        Direction::Followers,
        user_id,
        claims.map(|c| c.sub),
        page,
    )
    .await?;
    Ok(ApiResponse::success(list))
}

/// Get users that a user is following
/// GET /api/users/:id/following
pub async fn get_following(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let list = follow_list(
        &pool,
        Direction::Following,
        user_id,
        claims.map(|c| c.sub),
        page,
    )
    .await?;
    Ok(ApiResponse::success(list))
}

async fn follow_list(
    pool: &PgPool,
    direction: Direction,
    user_id: Uuid,
    viewer: Option<Uuid>,
    page: PageQuery,
) -> Result<FollowListResponse, AppError> {
    let (count_column, join_column, filter_column) = match direction {
        Direction::Followers => ("followers_count", "follower_id", "following_id"),
        Direction::Following => ("following_count", "following_id", "follower_id"),
    };

    // Denormalized count from the users table
    let user_row = sqlx::query(&format!(
        "SELECT {} AS total FROM users WHERE id = $1",
        count_column
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let total: i32 = user_row.get("total");
    let total = total as i64;

    let (limit, offset) = page.resolve(20, 100);

    let query_str = format!(
        r#"
        SELECT
            u.id, u.username, u.first_name, u.last_name, u.avatar_url, u.bio,
            f.created_at AS followed_at,
            EXISTS(
                SELECT 1 FROM follows v WHERE v.follower_id = $2 AND v.following_id = u.id
            ) AS is_following
        FROM follows f
        JOIN users u ON f.{} = u.id
        WHERE f.{} = $1
        ORDER BY f.created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        join_column, filter_column
    );

    let rows = sqlx::query_as::<_, UserFollowRow>(&query_str)
        .bind(user_id)
        .bind(viewer)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let users: Vec<FollowUserResponse> = rows.into_iter().map(FollowUserResponse::from).collect();
    let has_more = (offset + limit) < total;

    Ok(FollowListResponse {
        users,
        total,
        has_more,
    })
}

/// Check follow status for multiple users in a single request
/// POST /api/users/following-status
pub async fn check_following_bulk(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Json(payload): Json<BulkFollowCheckRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.user_ids.len() > 100 {
        return Err(AppError::UnprocessableEntity(
            "Maximum 100 user IDs allowed per request".to_string(),
        ));
    }

    if payload.user_ids.is_empty() {
        return Ok(ApiResponse::success(HashMap::<Uuid, bool>::new()));
    }

    let following_ids: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT following_id FROM follows
        WHERE follower_id = $1 AND following_id = ANY($2)
        "#,
    )
    .bind(claims.sub)
    .bind(&payload.user_ids)
    .fetch_all(&pool)
    .await?
    .into_iter()
    .collect();

    let result: HashMap<Uuid, bool> = payload
        .user_ids
        .into_iter()
        .map(|id| (id, following_ids.contains(&id)))
        .collect();

    Ok(ApiResponse::success(result))
}

/// Helper struct for follow suggestions query
#[derive(FromRow)]
struct SuggestionRow {
    id: Uuid,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    followers_count: i32,
    mutual_count: i64,
}

impl From<SuggestionRow> for FollowSuggestionResponse {
    fn from(s: SuggestionRow) -> Self {
        FollowSuggestionResponse {
            user: AuthorResponse {
                id: s.id,
                username: s.username,
                first_name: s.first_name,
                last_name: s.last_name,
                avatar_url: s.avatar_url,
            },
            bio: s.bio,
            followers_count: s.followers_count as i64,
            mutual_followers_count: s.mutual_count,
        }
    }
}

/// Suggested users to follow
/// GET /api/users/suggestions
///
/// Users followed by people you follow come first, ranked by mutual
/// connections; the list is padded with popular accounts you don't follow.
pub async fn get_follow_suggestions(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
    Query(query): Query<SuggestionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 50);

    let mutual = sqlx::query_as::<_, SuggestionRow>(
        r#"
        SELECT
            u.id, u.username, u.first_name, u.last_name, u.avatar_url, u.bio,
            u.followers_count,
            COUNT(DISTINCT f2.follower_id) AS mutual_count
        FROM follows f1
        JOIN follows f2 ON f1.following_id = f2.follower_id
        JOIN users u ON f2.following_id = u.id
        WHERE f1.follower_id = $1
          AND f2.following_id != $1
          AND NOT EXISTS (
              SELECT 1 FROM follows
              WHERE follower_id = $1 AND following_id = f2.following_id
          )
        GROUP BY u.id
        ORDER BY mutual_count DESC, u.followers_count DESC
        LIMIT $2
        "#,
    )
    .bind(claims.sub)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Follow suggestions error: {:?}", e);
        AppError::InternalServerError
    })?;

    let mut popular = Vec::new();
    if (mutual.len() as i64) < limit {
        popular = sqlx::query_as::<_, SuggestionRow>(
            r#"
            SELECT
                u.id, u.username, u.first_name, u.last_name, u.avatar_url, u.bio,
                u.followers_count,
                0::BIGINT AS mutual_count
            FROM users u
            WHERE u.id != $1
              AND NOT EXISTS (
                  SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = u.id
              )
            ORDER BY u.followers_count DESC, u.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(claims.sub)
        .bind(limit)
        .fetch_all(&pool)
        .await?;
    }

    let response = merge_suggestions(
        mutual.into_iter().map(FollowSuggestionResponse::from).collect(),
        popular
            .into_iter()
            .map(FollowSuggestionResponse::from)
            .collect(),
        limit as usize,
    );

    Ok(ApiResponse::success(response))
}

async fn ensure_user_exists(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    Ok(())
}

/// Current counters after a follow change, read inside the same transaction.
async fn follow_counts(
    tx: &mut Transaction<'_, Postgres>,
    following: bool,
    target: Uuid,
    viewer: Uuid,
) -> Result<FollowActionResponse, AppError> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT followers_count FROM users WHERE id = $1) AS followers_count,
            (SELECT following_count FROM users WHERE id = $2) AS following_count
        "#,
    )
    .bind(target)
    .bind(viewer)
    .fetch_one(&mut **tx)
    .await?;

    let followers_count: Option<i32> = row.get("followers_count");
    let following_count: Option<i32> = row.get("following_count");

    Ok(FollowActionResponse {
        following,
        followers_count: followers_count.unwrap_or(0) as i64,
        following_count: following_count.unwrap_or(0) as i64,
    })
}
