//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들과 라우터 구성을 모아둔 모듈입니다.
//!
//! 각 하위 모듈:
//! - `attendance`: 학생 체크인, 출석 기록 조회, 수동 출석 처리
//! - `auth`: 인증 관련 (회원가입, 로그인, 토큰 갱신, 로그아웃)
//! - `health`: 서버 상태 확인 (헬스체크)
//! - `sessions`: 교사 측 세션 시작/실시간 코드/종료
//! - `users`: 관리자의 교사/관리자 계정 발급

pub mod attendance;
pub mod auth;
pub mod health;
pub mod sessions;
pub mod users;

pub use attendance::*;
pub use health::*;
pub use sessions::*;

use crate::config::AttendancePolicy;
use crate::services::generator::Generators;
use crate::services::store::SqliteStore;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// 인증 정보, 정책, 실행 중인 생성기를 한 객체에 모아 명시적으로 전달합니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀 (내부적으로 Arc로 공유)
    pub pool: SqlitePool,
    /// JWT 토큰 서명용 비밀키
    pub jwt_secret: String,
    pub policy: AttendancePolicy,
    /// 출석 저장소 (같은 풀을 감쌈)
    pub store: SqliteStore,
    /// 실행 중인 QR 생성기들
    pub generators: Generators<SqliteStore>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt_secret: String, policy: AttendancePolicy) -> Self {
        let store = SqliteStore::new(pool.clone());
        Self {
            generators: Generators::new(store.clone(), policy.clone()),
            pool,
            jwt_secret,
            policy,
            store,
        }
    }
}

/// `/api/v1` 아래에 붙는 API 라우터
pub fn api_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/users", post(users::create_user));

    Router::new()
        .merge(auth_routes)
        // 교사 측: 세션 시작 / 실시간 코드 / 종료
        .route("/attendance/sessions", post(start_session))
        .route("/attendance/sessions/{id}/live", get(live_session))
        .route("/attendance/sessions/{id}/stop", post(stop_session))
        .route(
            "/attendance/sessions/{id}/records",
            get(list_session_records).post(mark_manually),
        )
        .route("/classrooms/{id}/sessions", get(list_classroom_sessions))
        // 학생 측: 체크인 / 내 출석 이력
        .route("/attendance/check-in", post(check_in))
        .route("/attendance/me", get(my_attendance))
        .route("/health", get(health_check))
        .with_state(state)
}
