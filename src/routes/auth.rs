use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::AppState;
use crate::auth::middleware::{AuthUser, COOKIE_NAME};
use crate::auth::{jwt, password};
use crate::error::AppError;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User, UserResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), AppError> {
    let username = body.username.trim().to_string();
    let email = body.email.trim().to_lowercase();

    if username.is_empty() || email.is_empty() {
        return Err(AppError::BadRequest("Username and email are required".into()));
    }
    password::validate_password(&body.password)?;

    let (taken,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (
            SELECT 1 FROM users
            WHERE (username = $1 OR email = $2) AND deleted_at IS NULL
         )",
    )
    .bind(&username)
    .bind(&email)
    .fetch_one(&state.db)
    .await?;

    if taken {
        return Err(AppError::Conflict("Username or email already taken".into()));
    }

    let password_hash = password::hash_password(&body.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, password_hash)
         VALUES ($1, $2, $3)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&username)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        // Lost a race with a concurrent registration.
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return AppError::Conflict("Username or email already taken".into());
            }
        }
        AppError::from(e)
    })?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");

    let (jar, response) = issue_token(&state, jar, user)?;
    Ok((StatusCode::CREATED, jar, response))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let email = body.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
    ))
    .bind(&email)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::InvalidCredentials)?;

    if !password::verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    issue_token(&state, jar, user)
}

async fn logout(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(COOKIE_NAME).path("/"))
}

async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Unauthorized)?;

    Ok(Json(UserResponse::from(user)))
}

fn issue_token(
    state: &AppState,
    jar: CookieJar,
    user: User,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let token = jwt::create_token(
        user.id,
        &user.username,
        &state.config.jwt_secret,
        state.config.token_expiry_hours,
    )?;
    let cookie = build_auth_cookie(token.clone(), state.config.token_expiry_hours);

    Ok((
        jar.add(cookie),
        Json(AuthResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

fn build_auth_cookie(token: String, expiry_hours: i64) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(expiry_hours))
        .build()
}
