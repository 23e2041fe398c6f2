//! # 출석 세션 모델 정의
//!
//! 교사가 한 번의 수업에서 QR 출석을 받는 "세션"을 표현합니다.
//! 세션은 교사 단말의 위치(anchor)에 고정되고, 일정 주기(기본 15초)마다
//! nonce와 만료 시각이 새로 발급됩니다.
//!
//! ## 세션 흐름
//! 1. 교사가 위치를 확인하고 `StartSessionRequest`로 세션 시작
//! 2. 생성기가 주기마다 nonce / expires_at / generation 을 교체
//! 3. 교사가 종료하면 `active = false`로 비활성화

use crate::models::geo::{GeoPoint, LocationReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 출석 세션 엔티티: DB의 `attendance_sessions` 테이블 한 행에 대응합니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceSession {
    /// 세션 고유 식별자 (생성기가 저장 전에 발급하는 UUID)
    pub id: String,
    pub classroom_id: String,
    pub course_id: String,
    /// 강의/교시 참조: 선택 항목
    pub lecture_id: Option<String>,
    /// 세션을 연 교사의 사용자 ID
    pub teacher_id: String,
    /// 현재 유효한 nonce. 응답에는 노출하지 않습니다.
    #[serde(skip_serializing)]
    pub nonce: String,
    pub anchor_latitude: f64,
    pub anchor_longitude: f64,
    /// 현재 nonce의 만료 시각 (RFC 3339, UTC)
    pub expires_at: String,
    pub active: bool,
    /// 이 세션을 과목 전체 강의 수에 포함할지 여부
    pub counts_toward_total: bool,
    /// 회전 횟수. 저장소는 이보다 오래된 회전 쓰기를 무시합니다.
    pub generation: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl AttendanceSession {
    pub fn anchor(&self) -> GeoPoint {
        GeoPoint::new(self.anchor_latitude, self.anchor_longitude)
    }

    /// `expires_at`을 UTC 시각으로 파싱합니다. 형식이 깨졌으면 None.
    #[cfg(test)]
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.expires_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// 저장소에 새 세션을 만들 때 넘기는 값
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: String,
    pub classroom_id: String,
    pub course_id: String,
    pub lecture_id: Option<String>,
    pub teacher_id: String,
    pub nonce: String,
    pub anchor: GeoPoint,
    pub expires_at: DateTime<Utc>,
    pub counts_toward_total: bool,
}

/// 세션 시작 요청: `POST /api/v1/attendance/sessions`의 요청 본문
///
/// `location`은 교사 단말의 위치 조회 결과입니다. 위치가 없으면 세션을 시작하지 않습니다.
/// `counts_toward_total`은 확인(confirm) 단계에서 교사가 고른 값입니다.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub classroom_id: String,
    pub course_id: String,
    pub lecture_id: Option<String>,
    #[serde(default)]
    pub location: LocationReport,
    pub counts_toward_total: bool,
}

/// 교사 화면에 보여줄 실시간 상태: `GET /attendance/sessions/:id/live`
#[derive(Debug, Clone, Serialize)]
pub struct LiveSessionView {
    pub session_id: String,
    /// QR 코드로 렌더링할 문자열 (base64(JSON))
    pub code: String,
    pub expires_at: String,
    pub seconds_remaining: u32,
    pub generation: u64,
    pub attendee_count: i64,
    /// 저장소가 확인한 마지막 회전 번호. `generation`보다 작으면 아직 쓰기가 반영되지 않은 상태입니다.
    pub confirmed_generation: Option<u64>,
    pub last_persist_error: Option<String>,
}

/// 세션 종료 응답
#[derive(Debug, Serialize)]
pub struct StoppedSession {
    pub session_id: String,
    pub final_count: i64,
}
