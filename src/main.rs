//! # EduSphere 출석 서버 진입점
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. SQLite 연결 풀 생성과 마이그레이션
//! 4. 재시작 전에 남은 활성 세션 정리
//! 5. API 라우터 설정
//! 6. HTTP 서버 시작, 종료 신호가 오면 실행 중인 세션을 모두 종료

// ── 모듈 선언 ──
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use axum::Router;
use config::Config;
use routes::AppState;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 빌드된 프론트엔드(교사 코드 화면, 학생 스캐너)가 있으면 같은 서버에서 서빙합니다
const FRONTEND_DIST: &str = "../frontend/dist";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅 초기화 ──
    // RUST_LOG가 없으면 이 크레이트와 tower_http, axum을 debug로 봅니다.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edusphere_attendance=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 3단계: 설정 로딩 ──
    let config = Config::from_env()?;
    tracing::info!("Starting EduSphere attendance server on {}:{}", config.host, config.port);
    tracing::info!(
        "Attendance policy: {}s code window, {}m geofence, check-in without location {}",
        config.attendance.code_window_secs,
        config.attendance.geofence_radius_m,
        if config.attendance.allow_check_in_without_location { "allowed" } else { "rejected" }
    );

    // ── 4단계: SQLite 연결 풀 생성 ──
    // DB 파일이 없으면 새로 만들고, 외래 키 제약을 켭니다.
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    // ── 5단계: 마이그레이션 ──
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    // ── 6단계: 고아 세션 정리 ──
    // 회전 타이머는 프로세스 메모리에만 있으므로 재시작 전 세션은 살릴 수 없습니다.
    let orphaned = db::deactivate_orphaned_sessions(&pool).await?;
    if orphaned > 0 {
        tracing::warn!("Deactivated {} attendance session(s) left active by a previous run", orphaned);
    }

    // 첫 관리자 계정 (교사 계정은 관리자가 발급)
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        if routes::users::bootstrap_admin(&pool, username, password).await? {
            tracing::info!("Created initial admin account {}", username);
        }
    }

    // ── 7단계: 애플리케이션 상태와 라우터 ──
    let state = AppState::new(pool, config.jwt_secret.clone(), config.attendance.clone());
    let generators = state.generators.clone();
    let api_routes = routes::api_router(state);

    // 개발 환경에서는 모든 출처를 허용합니다.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = if Path::new(FRONTEND_DIST).exists() {
        tracing::info!("Serving frontend static files from {}", FRONTEND_DIST);

        // SPA이므로 찾을 수 없는 경로는 index.html로 돌려보냅니다.
        let serve_dir = ServeDir::new(FRONTEND_DIST)
            .not_found_service(ServeFile::new(format!("{FRONTEND_DIST}/index.html")));

        Router::new()
            .nest("/api/v1", api_routes)
            .fallback_service(serve_dir)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    } else {
        tracing::warn!("Frontend dist directory not found, serving API only");

        Router::new()
            .nest("/api/v1", api_routes)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    };

    // ── 8단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 실행 중인 세션의 타이머를 취소하고 비활성화합니다.
    generators.stop_all().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Ctrl+C를 기다립니다. 신호 핸들러를 못 걸면 종료 신호 없이 계속 실행합니다.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
