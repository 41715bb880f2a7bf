use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        jwt, utils, AuthResponse, AuthToken, ForgotPasswordRequest, LoginUser, RegisterUser,
        ResendVerificationRequest, ResetPasswordRequest, TokenType, User, UserResponse,
        VerifyEmailRequest,
    },
    config::settings::Settings,
    email::Mailer,
    error::{is_unique_violation, AppError},
    response::ApiResponse,
};

/// Create an account
/// POST /api/auth/sign-up
pub async fn signup(
    State(pool): State<PgPool>,
    State(settings): State<Settings>,
    State(mailer): State<Mailer>,
    jar: CookieJar,
    Json(payload): Json<RegisterUser>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let password_hash =
        utils::hash_password(&payload.password).map_err(|_| AppError::InternalServerError)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, username, email, first_name, last_name, password_hash)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&payload.username)
    .bind(payload.email.to_lowercase())
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&password_hash)
    .fetch_one(&pool)
    .await
    .map_err(|e: sqlx::Error| {
        if is_unique_violation(&e) {
            AppError::Conflict("Username or Email already exists".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    tracing::info!(user_id = %user.id, "user signed up");

    let verification = issue_token(&pool, user.id, TokenType::EmailVerification).await?;
    mailer.verification(user.email.clone(), verification);

    let token = jwt::create_token(user.id, &settings.jwt_secret, settings.jwt_ttl_hours)
        .map_err(|_| AppError::InternalServerError)?;

    Ok((
        jar.add(jwt::auth_cookie(token.clone(), &settings)),
        ApiResponse::success(AuthResponse {
            token,
            user: UserResponse::from(user),
        })
        .created(),
    ))
}

/// Sign in with email and password
/// POST /api/auth/sign-in
pub async fn login(
    State(pool): State<PgPool>,
    State(settings): State<Settings>,
    jar: CookieJar,
    Json(payload): Json<LoginUser>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.to_lowercase())
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::Unauthorized)?;

    utils::verify_password(&user.password_hash, &payload.password)
        .map_err(|_| AppError::Unauthorized)?;

    let token = jwt::create_token(user.id, &settings.jwt_secret, settings.jwt_ttl_hours)
        .map_err(|_| AppError::InternalServerError)?;

    Ok((
        jar.add(jwt::auth_cookie(token.clone(), &settings)),
        ApiResponse::success(AuthResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

/// POST /api/auth/sign-out
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(jwt::removal_cookie()),
        ApiResponse::ok("Signed out"),
    )
}

/// GET /api/auth/me
pub async fn get_me(
    State(pool): State<PgPool>,
    claims: jwt::Claims,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::success(UserResponse::from(user)))
}

/// POST /api/auth/verify-email
pub async fn verify_email(
    State(pool): State<PgPool>,
    State(mailer): State<Mailer>,
    Json(payload): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let token = consume_token(&mut tx, &payload.token, TokenType::EmailVerification).await?;

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(token.user_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    mailer.welcome(user.email.clone(), user.username.clone());

    Ok(ApiResponse::success(UserResponse::from(user)))
}

/// POST /api/auth/resend-verification
///
/// Always answers 200 so the endpoint does not reveal which addresses are registered.
pub async fn resend_verification(
    State(pool): State<PgPool>,
    State(mailer): State<Mailer>,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.to_lowercase())
        .fetch_optional(&pool)
        .await?;

    if let Some(user) = user.filter(|u| !u.email_verified) {
        let token = issue_token(&pool, user.id, TokenType::EmailVerification).await?;
        mailer.verification(user.email, token);
    }

    Ok(ApiResponse::ok(
        "If the account exists and is unverified, a new link has been sent",
    ))
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(pool): State<PgPool>,
    State(mailer): State<Mailer>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(payload.email.to_lowercase())
        .fetch_optional(&pool)
        .await?;

    if let Some(user) = user {
        let token = issue_token(&pool, user.id, TokenType::PasswordReset).await?;
        mailer.password_reset(user.email, token);
    }

    Ok(ApiResponse::ok(
        "If the account exists, a password reset link has been sent",
    ))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(pool): State<PgPool>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let password_hash =
        utils::hash_password(&payload.new_password).map_err(|_| AppError::InternalServerError)?;

    let mut tx = pool.begin().await?;

    let token = consume_token(&mut tx, &payload.token, TokenType::PasswordReset).await?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&password_hash)
        .bind(token.user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %token.user_id, "password reset");

    Ok(ApiResponse::ok("Password updated"))
}

/// Store a fresh single-use token and return its value.
async fn issue_token(pool: &PgPool, user_id: Uuid, kind: TokenType) -> Result<String, AppError> {
    let token = utils::generate_secure_token();

    sqlx::query(
        r#"
        INSERT INTO auth_tokens (user_id, token, token_type, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(&token)
    .bind(kind.as_str())
    .bind(chrono::Utc::now() + kind.ttl())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Look up a token of the given type and mark it used. Unknown, used and
/// expired tokens are all reported the same way.
async fn consume_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    token: &str,
    kind: TokenType,
) -> Result<AuthToken, AppError> {
    let invalid = || AppError::BadRequest("Invalid or expired token".to_string());

    let record = sqlx::query_as::<_, AuthToken>(
        r#"
        SELECT id, user_id, expires_at, used_at
        FROM auth_tokens
        WHERE token = $1 AND token_type = $2
        FOR UPDATE
        "#,
    )
    .bind(token)
    .bind(kind.as_str())
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(invalid)?;

    if record.used_at.is_some() || record.expires_at < chrono::Utc::now() {
        return Err(invalid());
    }

    sqlx::query("UPDATE auth_tokens SET used_at = NOW() WHERE id = $1")
        .bind(record.id)
        .execute(&mut **tx)
        .await?;

    Ok(record)
}
