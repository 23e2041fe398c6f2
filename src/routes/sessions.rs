//! # 출석 세션 API 라우트 핸들러 (교사 측)
//!
//! ## 엔드포인트 목록
//! | 메서드 | 경로 | 핸들러 | 설명 |
//! |--------|------|--------|------|
//! | POST | /api/v1/attendance/sessions | `start_session` | 위치 확인 후 세션 시작, 첫 코드 반환 |
//! | GET | /api/v1/attendance/sessions/:id/live | `live_session` | 현재 코드, 카운트다운, 출석 인원 |
//! | POST | /api/v1/attendance/sessions/:id/stop | `stop_session` | 타이머 취소 + 비활성화, 최종 인원 |
//! | GET | /api/v1/classrooms/:id/sessions | `list_classroom_sessions` | 강의실 세션 이력 |
//!
//! ## 사용 흐름
//! ```text
//! 1. 교사 단말이 위치를 얻음 → POST /attendance/sessions (위치 + 강의 수 포함 여부)
//! 2. 화면이 1초마다 GET /attendance/sessions/:id/live 로 코드를 갱신
//! 3. 수업 종료 → POST /attendance/sessions/:id/stop
//! ```

use crate::{
    db,
    error::AppError,
    middleware::auth::AuthUser,
    models::*,
    routes::AppState,
    services::access::Action,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

/// 세션을 연 교사 본인이거나 관리자인지 확인합니다.
pub(crate) fn ensure_owner(auth: &AuthUser, teacher_id: &str) -> Result<(), AppError> {
    if auth.role == Role::Admin || auth.user_id == teacher_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the teacher who started this session can manage it".to_string(),
        ))
    }
}

/// `POST /api/v1/attendance/sessions`: 새 출석 세션을 시작합니다.
///
/// 요청 본문 예:
/// ```json
/// { "classroom_id": "room-101", "course_id": "cs101",
///   "location": { "position": { "latitude": 12.9716, "longitude": 77.5946 } },
///   "counts_toward_total": true }
/// ```
///
/// 위치가 없으면(`location.error`만 있거나 비어 있으면) 422와 안내 문구를 반환하고
/// 세션을 만들지 않습니다.
pub async fn start_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<LiveSessionView>), AppError> {
    auth.require(Action::StartSession)?;

    if req.classroom_id.trim().is_empty() || req.course_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "classroom_id and course_id are required".to_string(),
        ));
    }

    let view = state.generators.start(&auth.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/v1/attendance/sessions/:id/live`: 교사 화면에 띄울 현재 상태
///
/// 코드는 서버 메모리의 화면 상태에서 바로 읽습니다. 회전 쓰기가 아직 끝나지 않았어도
/// 항상 최신 코드가 나갑니다.
pub async fn live_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LiveSessionView>, AppError> {
    auth.require(Action::ViewLiveCode)?;

    let live = state.generators.live(&id).await.ok_or(AppError::NotFound)?;
    ensure_owner(&auth, &live.teacher_id)?;

    Ok(Json(live.view().await))
}

/// `POST /api/v1/attendance/sessions/:id/stop`: 세션을 종료하고 최종 인원을 돌려줍니다.
pub async fn stop_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<StoppedSession>, AppError> {
    auth.require(Action::StopSession)?;

    let session = db::get_session(&state.pool, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner(&auth, &session.teacher_id)?;

    let stopped = state.generators.stop(&id).await?;
    Ok(Json(stopped))
}

/// `GET /api/v1/classrooms/:id/sessions` → `{ "sessions": [...] }` (최신순)
pub async fn list_classroom_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    auth.require(Action::ListClassroomSessions)?;

    let sessions = db::list_sessions_for_classroom(&state.pool, &id).await?;
    Ok(Json(json!({ "sessions": sessions })))
}
