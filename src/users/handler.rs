use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{jwt, User, UserResponse},
    config::settings::Settings,
    error::AppError,
    response::ApiResponse,
    uploads,
    users::{AuthorResponse, SearchQuery, UpdateProfile, UserProfileResponse},
};

/// Helper struct for fetching a profile with the viewer's follow flag
#[derive(FromRow)]
struct ProfileRow {
    id: Uuid,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    followers_count: i32,
    following_count: i32,
    posts_count: i32,
    is_following: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProfileRow> for UserProfileResponse {
    fn from(u: ProfileRow) -> Self {
        UserProfileResponse {
            id: u.id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            bio: u.bio,
            avatar_url: u.avatar_url,
            followers_count: u.followers_count as i64,
            following_count: u.following_count as i64,
            posts_count: u.posts_count as i64,
            is_following: u.is_following,
            created_at: u.created_at,
        }
    }
}

const PROFILE_SELECT: &str = r#"
    SELECT
        u.id, u.username, u.first_name, u.last_name, u.bio, u.avatar_url,
        u.followers_count, u.following_count, u.posts_count, u.created_at,
        EXISTS(
            SELECT 1 FROM follows f WHERE f.follower_id = $2 AND f.following_id = u.id
        ) AS is_following
    FROM users u
"#;

/// Get user profile with follow stats
/// GET /api/users/:id
pub async fn get_user_profile(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let query = format!("{} WHERE u.id = $1", PROFILE_SELECT);
    let profile = sqlx::query_as::<_, ProfileRow>(&query)
        .bind(user_id)
        .bind(claims.map(|c| c.sub))
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::success(UserProfileResponse::from(profile)))
}

/// GET /api/users/by-username/:username
pub async fn get_user_by_username(
    State(pool): State<PgPool>,
    claims: Option<jwt::Claims>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let query = format!("{} WHERE LOWER(u.username) = LOWER($1)", PROFILE_SELECT);
    let profile = sqlx::query_as::<_, ProfileRow>(&query)
        .bind(&username)
        .bind(claims.map(|c| c.sub))
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::success(UserProfileResponse::from(profile)))
}

#[derive(FromRow)]
struct AuthorRow {
    id: Uuid,
    username: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<AuthorRow> for AuthorResponse {
    fn from(a: AuthorRow) -> Self {
        AuthorResponse {
            id: a.id,
            username: a.username,
            first_name: a.first_name,
            last_name: a.last_name,
            avatar_url: a.avatar_url,
        }
    }
}

/// Search users by username or name
/// GET /api/users/search?q=
pub async fn search_users(
    State(pool): State<PgPool>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let term = query.q.trim();
    if term.is_empty() {
        return Ok(ApiResponse::success(Vec::<AuthorResponse>::new()));
    }

    let limit = query.limit.unwrap_or(20).clamp(1, 50);
    let pattern = format!("%{}%", escape_like(term));
    let prefix = format!("{}%", escape_like(term));

    // Username prefix matches first, then popularity
    let rows = sqlx::query_as::<_, AuthorRow>(
        r#"
        SELECT id, username, first_name, last_name, avatar_url
        FROM users
        WHERE username ILIKE $1
           OR first_name ILIKE $1
           OR last_name ILIKE $1
           OR (COALESCE(first_name, '') || ' ' || COALESCE(last_name, '')) ILIKE $1
        ORDER BY (username ILIKE $2) DESC, followers_count DESC, username ASC
        LIMIT $3
        "#,
    )
    .bind(&pattern)
    .bind(&prefix)
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    let users: Vec<AuthorResponse> = rows.into_iter().map(AuthorResponse::from).collect();

    Ok(ApiResponse::success(users))
}

/// Update the signed-in user's profile. Absent fields are left unchanged.
/// PATCH /api/users/me
pub async fn update_me(
    State(pool): State<PgPool>,
    State(settings): State<Settings>,
    claims: jwt::Claims,
    Json(payload): Json<UpdateProfile>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if let Some(url) = &payload.avatar_url {
        uploads::handler::ensure_own_image(&settings, url, claims.sub)?;
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            bio = COALESCE($4, bio),
            avatar_url = COALESCE($5, avatar_url),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(claims.sub)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.bio)
    .bind(&payload.avatar_url)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::success(UserResponse::from(user)))
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("jane"), "jane");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
