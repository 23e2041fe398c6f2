//! # 에러 처리 모듈
//!
//! 애플리케이션에서 발생할 수 있는 에러 타입을 정의합니다.
//! Rust에서는 예외(exception) 대신 `Result<T, E>` 타입으로 에러를 처리합니다.
//!
//! 이 모듈의 핵심:
//! - `StoreError`: 세션/출석 저장소 계층의 에러 (중복 기록을 별도로 구분)
//! - `AppError`: 모든 에러 종류를 하나로 모아 HTTP 응답으로 변환

use crate::models::geo::GeolocationError;
use crate::services::scanner::CheckInError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 세션/출석 저장소 에러
///
/// `(session_id, student_id)` 유니크 제약 위반은 `Duplicate`로 따로 분류합니다.
/// 동시에 두 번 제출된 체크인을 "이미 출석함"으로 돌려주기 위해서입니다.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate attendance record")]
    Duplicate,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// sqlx 에러를 분류합니다. 유니크 제약 위반이면 `Duplicate`.
    pub fn classify(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Database(err),
        }
    }
}

/// 애플리케이션에서 발생할 수 있는 모든 에러 종류
///
/// 핸들러에서 `Result<T, AppError>`를 반환하면,
/// Axum이 `IntoResponse`를 호출하여 HTTP 응답으로 변환합니다.
#[derive(Debug, Error)]
pub enum AppError {
    /// 요청한 리소스를 찾을 수 없음 (HTTP 404)
    #[error("Resource not found")]
    NotFound,

    /// 잘못된 요청 (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 서버 내부 오류 (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// 데이터베이스 오류 (HTTP 500)
    /// #[from]: sqlx::Error → AppError::Database 자동 변환
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 세션/출석 저장소 오류
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 인증 실패 (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 역할 권한 부족 (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 리소스 충돌 (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 교사 측 위치 조회 실패: 위치 없이 세션을 시작하지 않습니다 (HTTP 422)
    #[error(transparent)]
    Geolocation(#[from] GeolocationError),

    /// 학생 체크인 검증 실패: 사유별로 상태 코드가 다릅니다
    #[error(transparent)]
    CheckIn(#[from] CheckInError),
}

impl IntoResponse for AppError {
    /// AppError를 HTTP 응답으로 변환합니다.
    ///
    /// 내부 에러(Database, Internal)는 실제 내용을 로그에만 기록하고,
    /// 클라이언트에는 일반적인 메시지만 반환합니다.
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::BadRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.clone())
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Database(ref e) | AppError::Store(StoreError::Database(ref e)) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Store(StoreError::Duplicate) => (
                StatusCode::CONFLICT,
                "already_marked",
                "Attendance already marked for this session".to_string(),
            ),
            AppError::Unauthorized(ref msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::Geolocation(ref e) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "location_unavailable", e.to_string())
            }
            AppError::CheckIn(ref e) => {
                if let CheckInError::Submission(ref source) = e {
                    tracing::error!("Attendance submission failed: {}", source);
                }
                (e.status(), e.code(), e.to_string())
            }
        };

        // 결과: { "error": { "code": "expired", "message": "..." } }
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
