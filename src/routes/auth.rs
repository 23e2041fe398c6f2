use crate::{
    db::users as db_users,
    error::AppError,
    middleware::auth::{create_access_token, create_refresh_token, hash_token, verify_refresh_token, AuthUser},
    models::user::*,
    routes::AppState,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::SqlitePool;

/// Issue an access/refresh pair and persist the refresh token hash.
async fn issue_tokens(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let access_token = create_access_token(&user.id, user.role, &state.jwt_secret)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;
    let refresh_token = create_refresh_token(&user.id, user.role, &state.jwt_secret)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

    let token_id = uuid::Uuid::now_v7().to_string();
    let token_hash = hash_token(&refresh_token);
    let expires_at = (Utc::now() + Duration::days(7))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();

    db_users::store_refresh_token(&state.pool, &token_id, &user.id, &token_hash, &expires_at).await?;

    Ok(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
    })
}

/// Hash a password with Argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Validate and create an account. Shared by self-registration and admin provisioning.
pub(crate) async fn create_account(
    pool: &SqlitePool,
    username: &str,
    email: Option<&str>,
    password: &str,
    role: Role,
) -> Result<User, AppError> {
    // Validate input
    if username.len() < 3 {
        return Err(AppError::BadRequest("Username must be at least 3 characters".to_string()));
    }
    if password.len() < 8 {
        return Err(AppError::BadRequest("Password must be at least 8 characters".to_string()));
    }
    if let Some(email) = email {
        if !email.contains('@') {
            return Err(AppError::BadRequest("Invalid email address".to_string()));
        }
    }

    // Check if username already exists
    if db_users::find_by_username(pool, username).await?.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    // Check if email already exists
    if let Some(email) = email {
        if db_users::find_by_email(pool, email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }
    }

    let password_hash = hash_password(password)?;
    let user_id = uuid::Uuid::now_v7().to_string();
    let user = db_users::create_user(pool, &user_id, username, email, &password_hash, role).await?;

    tracing::info!("Created {} account {}", role.as_str(), user.username);
    Ok(user)
}

/// Self-registration only ever creates student accounts.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let role = req.role.unwrap_or_default();
    if role != Role::Student {
        return Err(AppError::Forbidden(format!(
            "{} accounts are provisioned by an administrator",
            role.as_str()
        )));
    }

    let user = create_account(
        &state.pool,
        &req.username,
        req.email.as_deref(),
        &req.password,
        Role::Student,
    )
    .await?;

    Ok(Json(issue_tokens(&state, user).await?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = db_users::find_by_username(&state.pool, &req.username)
        .await?
        .ok_or(AppError::Unauthorized("Invalid username or password".to_string()))?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(format!("Password hash parse error: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized("Invalid username or password".to_string()))?;

    Ok(Json(issue_tokens(&state, user).await?))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let _claims = verify_refresh_token(&req.refresh_token, &state.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    // Check if refresh token hash exists in DB
    let token_hash = hash_token(&req.refresh_token);
    let (_token_id, user_id, expires_at) = db_users::find_refresh_token(&state.pool, &token_hash)
        .await?
        .ok_or(AppError::Unauthorized("Refresh token not found or revoked".to_string()))?;

    let expires = chrono::NaiveDateTime::parse_from_str(&expires_at, "%Y-%m-%dT%H:%M:%S%.3fZ")
        .map_err(|e| AppError::Internal(format!("Date parse error: {}", e)))?;
    if expires.and_utc() < Utc::now() {
        db_users::delete_refresh_token(&state.pool, &token_hash).await?;
        return Err(AppError::Unauthorized("Refresh token expired".to_string()));
    }

    // Role may have changed since the token was issued, so reload the user
    let user = db_users::find_by_id(&state.pool, &user_id)
        .await?
        .ok_or(AppError::Unauthorized("User not found".to_string()))?;

    // Rotate: the old refresh token is single-use
    db_users::delete_refresh_token(&state.pool, &token_hash).await?;

    Ok(Json(issue_tokens(&state, user).await?))
}

pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Value>, AppError> {
    db_users::delete_user_refresh_tokens(&state.pool, &auth_user.user_id).await?;

    Ok(Json(json!({ "message": "Logged out successfully" })))
}

pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = db_users::find_by_id(&state.pool, &auth_user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use crate::config::AttendancePolicy;
    use crate::routes::api_router;
    use crate::test_support::{app_state, request};
    use axum::{http::StatusCode, Router};
    use serde_json::{json, Value};

    async fn app() -> Router {
        api_router(app_state(AttendancePolicy::default()).await)
    }

    async fn register_student(app: &Router, username: &str) -> Value {
        let (status, body) = request(
            app,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": username, "password": "correct-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    fn token<'a>(body: &'a Value, field: &str) -> &'a str {
        body[field].as_str().unwrap()
    }

    #[tokio::test]
    async fn self_registration_is_student_only() {
        let app = app().await;

        let body = register_student(&app, "minji").await;
        assert_eq!(body["user"]["role"], "student");

        for role in ["faculty", "admin"] {
            let (status, body) = request(
                &app,
                "POST",
                "/auth/register",
                None,
                Some(json!({ "username": format!("fake-{role}"), "password": "correct-horse", "role": role })),
            )
            .await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{role}");
            assert_eq!(body["error"]["code"], "forbidden");
        }

        let (status, _) = request(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "minji", "password": "correct-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let app = app().await;
        register_student(&app, "minji").await;

        let (status, body) = request(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "minji", "password": "wrong-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["access_token"].is_null());

        let (status, _) = request(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": "correct-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = request(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "minji", "password": "correct-horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "minji");
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_token_is_rejected() {
        let app = app().await;
        let issued = register_student(&app, "minji").await;
        let old_refresh = token(&issued, "refresh_token");

        let (status, rotated) = request(
            &app,
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": old_refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(token(&rotated, "refresh_token"), old_refresh);

        let (status, _) = request(
            &app,
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": old_refresh })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = request(
            &app,
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": token(&rotated, "refresh_token") })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn access_and_refresh_tokens_stay_in_their_lanes() {
        let app = app().await;
        let issued = register_student(&app, "minji").await;

        let (status, body) =
            request(&app, "GET", "/auth/me", Some(token(&issued, "refresh_token")), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "invalid_token");

        let (status, _) = request(
            &app,
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": token(&issued, "access_token") })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) =
            request(&app, "GET", "/auth/me", Some(token(&issued, "access_token")), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "student");
    }

    #[tokio::test]
    async fn logout_revokes_refresh_tokens() {
        let app = app().await;
        let issued = register_student(&app, "minji").await;

        let (status, _) =
            request(&app, "POST", "/auth/logout", Some(token(&issued, "access_token")), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = request(
            &app,
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": token(&issued, "refresh_token") })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_requires_a_token() {
        let app = app().await;
        let (status, body) = request(&app, "GET", "/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "missing_token");
    }
}
