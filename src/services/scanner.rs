//! # QR 스캐너 / 체크인 검증 (학생 측)
//!
//! 학생 단말이 읽은 코드를 검증하고 출석 기록을 남깁니다.
//!
//! ## 검증 순서
//! 어느 단계에서든 실패하면 그 자리에서 사유와 함께 끝납니다.
//! 1. 페이로드 디코딩 → `InvalidFormat`
//! 2. 만료 시각 확인 → `Expired`
//! 3. 활성 세션 조회 → `SessionNotFound`
//! 4. (정책) 현재 nonce 일치 확인 → `StaleCode`
//! 5. 위치가 있으면 반경 확인 → `TooFar` / 위치가 없으면 정책에 따라 통과 또는 `LocationRequired`
//! 6. 기존 기록 확인 → `AlreadyMarked`
//! 7. `present` / `qr_scan` 기록 추가
//!
//! 동시에 들어온 같은 학생의 체크인은 6단계를 함께 통과할 수 있습니다.
//! 그 경우 저장소의 유니크 제약이 두 번째 추가를 막고, 이것도 `AlreadyMarked`로 돌려줍니다.

use crate::config::AttendancePolicy;
use crate::error::{AppError, StoreError};
use crate::models::{
    AttendanceRecord, AttendanceStatus, GeolocationError, LocationReport, MarkingMethod,
    NewAttendanceRecord,
};
use crate::services::geo::within_radius;
use crate::services::payload::{PayloadError, ScanPayload};
use crate::services::store::AttendanceStore;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// 체크인 실패 사유. 메시지는 학생 화면에 그대로 보여줍니다.
#[derive(Debug, Error)]
pub enum CheckInError {
    #[error("Invalid QR code. Please scan the code shown by your teacher.")]
    InvalidFormat(#[source] PayloadError),

    #[error("This QR code has expired. Please rescan the current code.")]
    Expired,

    #[error("Attendance session not found or no longer active.")]
    SessionNotFound,

    #[error("This QR code has been replaced. Please rescan the current code.")]
    StaleCode,

    #[error("You are too far from the classroom ({distance_m:.0} m away, allowed {radius_m:.0} m).")]
    TooFar { distance_m: f64, radius_m: f64 },

    #[error("Your location is required to check in. {guidance}")]
    LocationRequired { guidance: String },

    #[error("Attendance already marked for this session.")]
    AlreadyMarked,

    #[error("Could not submit attendance. Please try again.")]
    Submission(#[source] StoreError),
}

impl CheckInError {
    pub fn code(&self) -> &'static str {
        match self {
            CheckInError::InvalidFormat(_) => "invalid_format",
            CheckInError::Expired => "expired",
            CheckInError::SessionNotFound => "session_not_found",
            CheckInError::StaleCode => "stale_code",
            CheckInError::TooFar { .. } => "too_far",
            CheckInError::LocationRequired { .. } => "location_required",
            CheckInError::AlreadyMarked => "already_marked",
            CheckInError::Submission(_) => "submission_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CheckInError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            CheckInError::Expired => StatusCode::GONE,
            CheckInError::SessionNotFound => StatusCode::NOT_FOUND,
            CheckInError::StaleCode | CheckInError::AlreadyMarked => StatusCode::CONFLICT,
            CheckInError::TooFar { .. } => StatusCode::FORBIDDEN,
            CheckInError::LocationRequired { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CheckInError::Submission(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 학생 한 명의 체크인 시도
#[derive(Debug, Clone)]
pub struct CheckInAttempt {
    pub raw_payload: String,
    pub student_id: String,
    pub location: LocationReport,
}

/// 코드를 검증하고 출석을 기록합니다. `now`는 만료 판정 기준 시각입니다.
pub async fn check_in<S: AttendanceStore>(
    store: &S,
    policy: &AttendancePolicy,
    attempt: &CheckInAttempt,
    now: DateTime<Utc>,
) -> Result<AttendanceRecord, CheckInError> {
    let payload = ScanPayload::decode(&attempt.raw_payload).map_err(CheckInError::InvalidFormat)?;

    if payload.is_expired(now) {
        return Err(CheckInError::Expired);
    }

    let session = store
        .find_active_session(&payload.session_id)
        .await
        .map_err(CheckInError::Submission)?
        .ok_or(CheckInError::SessionNotFound)?;

    if policy.require_current_nonce && session.nonce != payload.nonce {
        return Err(CheckInError::StaleCode);
    }

    let location = attempt.location.position();
    match location {
        Some(point) => {
            let (inside, distance_m) = within_radius(session.anchor(), point, policy.geofence_radius_m);
            if !inside {
                return Err(CheckInError::TooFar {
                    distance_m,
                    radius_m: policy.geofence_radius_m,
                });
            }
        }
        None if policy.allow_check_in_without_location => {
            tracing::debug!(
                "Student {} checked in to {} without location ({:?})",
                attempt.student_id,
                session.id,
                attempt.location.error
            );
        }
        None => {
            return Err(CheckInError::LocationRequired {
                guidance: attempt
                    .location
                    .error
                    .unwrap_or(GeolocationError::PositionUnavailable)
                    .to_string(),
            });
        }
    }

    if store
        .attendance_exists(&session.id, &attempt.student_id)
        .await
        .map_err(CheckInError::Submission)?
    {
        return Err(CheckInError::AlreadyMarked);
    }

    let record = store
        .insert_attendance(&NewAttendanceRecord {
            session_id: session.id.clone(),
            student_id: attempt.student_id.clone(),
            course_id: session.course_id.clone(),
            status: AttendanceStatus::Present,
            location,
            method: MarkingMethod::QrScan,
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => CheckInError::AlreadyMarked,
            other => CheckInError::Submission(other),
        })?;

    tracing::info!("Student {} marked present in session {}", record.student_id, record.session_id);
    Ok(record)
}

/// 스캐너 화면의 단계
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    Scanning,
    Validating,
    Success { record: AttendanceRecord },
    Error { code: &'static str, message: String },
}

/// 스캐너 한 대의 상태 기계
///
/// `Idle → Scanning → Validating → Success | Error`, 그리고 `reset()`으로 다시 `Idle`.
/// 제출이 시작되면 결과가 나올 때까지 취소하지 않습니다.
pub struct Scanner<'a, S: AttendanceStore> {
    store: &'a S,
    policy: &'a AttendancePolicy,
    phase: ScanPhase,
}

impl<'a, S: AttendanceStore> Scanner<'a, S> {
    pub fn new(store: &'a S, policy: &'a AttendancePolicy) -> Self {
        Self {
            store,
            policy,
            phase: ScanPhase::Idle,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> &ScanPhase {
        &self.phase
    }

    /// 카메라(디코더)를 켭니다. `Idle`에서만 가능합니다.
    pub fn start(&mut self) -> bool {
        if matches!(self.phase, ScanPhase::Idle) {
            self.phase = ScanPhase::Scanning;
            true
        } else {
            false
        }
    }

    /// 디코딩된 코드를 제출합니다. `Scanning`이 아니면 검증 없이 실패합니다.
    pub async fn submit(
        &mut self,
        raw_payload: String,
        student_id: &str,
        location: LocationReport,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, ScannerError> {
        if !matches!(self.phase, ScanPhase::Scanning) {
            return Err(ScannerError::NotScanning);
        }
        // 디코더는 여기서 멈춥니다
        self.phase = ScanPhase::Validating;

        let attempt = CheckInAttempt {
            raw_payload,
            student_id: student_id.to_string(),
            location,
        };

        match check_in(self.store, self.policy, &attempt, now).await {
            Ok(record) => {
                self.phase = ScanPhase::Success {
                    record: record.clone(),
                };
                Ok(record)
            }
            Err(e) => {
                self.phase = ScanPhase::Error {
                    code: e.code(),
                    message: e.to_string(),
                };
                Err(ScannerError::CheckIn(e))
            }
        }
    }

    /// 결과 화면에서 다시 스캔하기
    #[cfg(test)]
    pub fn reset(&mut self) {
        self.phase = ScanPhase::Idle;
    }
}

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("scanner is not scanning")]
    NotScanning,
    #[error(transparent)]
    CheckIn(#[from] CheckInError),
}

impl From<ScannerError> for AppError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::NotScanning => AppError::Conflict("Scanner is not scanning".to_string()),
            ScannerError::CheckIn(e) => AppError::CheckIn(e),
        }
    }
}
