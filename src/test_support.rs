//! 테스트 공용 헬퍼

use crate::config::AttendancePolicy;
use crate::db::users::create_user;
use crate::middleware::auth::create_access_token;
use crate::models::Role;
use crate::routes::AppState;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret";

/// 마이그레이션이 적용된 인메모리 SQLite 풀
///
/// `sqlite::memory:`는 연결마다 별도 DB이므로 연결을 하나로 고정하고 닫히지 않게 둡니다.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

pub async fn app_state(policy: AttendancePolicy) -> AppState {
    AppState::new(memory_pool().await, TEST_SECRET.to_string(), policy)
}

/// 사용자를 하나 만들고 그 사용자의 액세스 토큰을 돌려줍니다
pub async fn seed_user(pool: &SqlitePool, id: &str, role: Role) -> String {
    create_user(pool, id, id, None, "not-a-real-hash", role)
        .await
        .unwrap();
    create_access_token(id, role, TEST_SECRET).unwrap()
}

/// 라우터에 요청 하나를 보내고 상태 코드와 JSON 본문을 돌려줍니다.
/// 본문이 JSON이 아니면 `Value::Null`입니다.
pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}
