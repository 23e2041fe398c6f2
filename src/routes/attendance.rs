//! # 출석 기록 API 라우트 핸들러
//!
//! ## 엔드포인트 목록
//! | 메서드 | 경로 | 핸들러 | 설명 |
//! |--------|------|--------|------|
//! | POST | /api/v1/attendance/check-in | `check_in` | 학생이 스캔한 코드 제출 |
//! | GET | /api/v1/attendance/me | `my_attendance` | 내 출석 이력 |
//! | GET | /api/v1/attendance/sessions/:id/records | `list_session_records` | 세션 출석 명단 |
//! | POST | /api/v1/attendance/sessions/:id/records | `mark_manually` | 교수의 수동 출석 처리 |

use crate::{
    db,
    error::AppError,
    middleware::auth::AuthUser,
    models::*,
    routes::{sessions::ensure_owner, AppState},
    services::{access::Action, scanner::Scanner},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

/// `POST /api/v1/attendance/check-in`: 스캔한 코드로 출석합니다.
///
/// 요청 본문 예:
/// ```json
/// { "payload": "eyJzaWQiOi...",
///   "location": { "position": { "latitude": 12.9716, "longitude": 77.5947 } } }
/// ```
///
/// 실패하면 사유별 상태 코드와 `{ "error": { "code", "message" } }`를 돌려줍니다.
pub async fn check_in(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CheckInRequest>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AppError> {
    auth.require(Action::CheckIn)?;

    let mut scanner = Scanner::new(&state.store, &state.policy);
    scanner.start();
    let record = scanner
        .submit(req.payload, &auth.user_id, req.location, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /api/v1/attendance/me` → `{ "records": [...] }` (최신순)
pub async fn my_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Value>, AppError> {
    auth.require(Action::ViewOwnAttendance)?;

    let records = db::list_for_student(&state.pool, &auth.user_id).await?;
    Ok(Json(json!({ "records": records })))
}

/// `GET /api/v1/attendance/sessions/:id/records` → `{ "records": [...], "count": n }`
pub async fn list_session_records(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    auth.require(Action::ListSessionRecords)?;

    let session = db::get_session(&state.pool, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner(&auth, &session.teacher_id)?;

    let records = db::list_for_session(&state.pool, &session.id).await?;
    Ok(Json(json!({ "count": records.len(), "records": records })))
}

/// `POST /api/v1/attendance/sessions/:id/records`: 학생 한 명을 직접 출석 처리합니다.
///
/// 세션이 이미 끝났어도 기록할 수 있습니다. 같은 학생이 이미 기록되어 있으면 409.
pub async fn mark_manually(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ManualMarkRequest>,
) -> Result<(StatusCode, Json<AttendanceRecord>), AppError> {
    auth.require(Action::MarkManually)?;

    if req.student_id.trim().is_empty() {
        return Err(AppError::BadRequest("student_id is required".to_string()));
    }

    let session = db::get_session(&state.pool, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner(&auth, &session.teacher_id)?;

    let record = db::insert_record(
        &state.pool,
        &NewAttendanceRecord {
            session_id: session.id,
            student_id: req.student_id,
            course_id: session.course_id,
            status: req.status,
            location: None,
            method: MarkingMethod::Manual,
        },
    )
    .await?;

    tracing::info!(
        "Student {} manually marked {:?} in session {} by {}",
        record.student_id,
        record.status,
        record.session_id,
        auth.user_id
    );
    Ok((StatusCode::CREATED, Json(record)))
}
