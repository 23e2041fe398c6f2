//! # 계정 발급 (관리자 전용)
//!
//! 가입 API는 학생 계정만 만듭니다. 교사와 관리자 계정은 여기서 발급합니다.
//!
//! | 메서드 | 경로 | 핸들러 |
//! |--------|------|--------|
//! | POST | /api/v1/users | `create_user` |
//!
//! 첫 관리자는 `ADMIN_USERNAME` / `ADMIN_PASSWORD` 환경변수로 서버 시작 시 만듭니다.

use crate::{
    db::users as db_users,
    error::AppError,
    middleware::auth::AuthUser,
    models::user::*,
    routes::{auth::create_account, AppState},
    services::access::Action,
};
use axum::{extract::State, http::StatusCode, Json};
use sqlx::SqlitePool;

/// `POST /api/v1/users`: 관리자가 임의 역할의 계정을 만듭니다.
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    auth.require(Action::ManageUsers)?;

    let user = create_account(
        &state.pool,
        &req.username,
        req.email.as_deref(),
        &req.password,
        req.role,
    )
    .await?;

    tracing::info!("Admin {} provisioned {}", auth.user_id, user.username);
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// 해당 이름의 계정이 없으면 관리자 계정을 만듭니다. 만들었으면 `true`.
pub async fn bootstrap_admin(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<bool, AppError> {
    if db_users::find_by_username(pool, username).await?.is_some() {
        return Ok(false);
    }
    create_account(pool, username, None, password, Role::Admin).await?;
    Ok(true)
}
