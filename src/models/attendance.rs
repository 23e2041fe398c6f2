use crate::models::geo::{GeoPoint, LocationReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

/// 출석이 어떤 경로로 기록되었는지 나타내는 태그
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MarkingMethod {
    QrScan,
    Manual,
}

/// 출석 기록: `attendance_records` 테이블 한 행. 생성 후에는 수정하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: String,
    pub session_id: String,
    pub student_id: String,
    pub course_id: String,
    pub status: AttendanceStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub method: MarkingMethod,
    pub marked_at: String,
}

impl AttendanceRecord {
    #[cfg(test)]
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub session_id: String,
    pub student_id: String,
    pub course_id: String,
    pub status: AttendanceStatus,
    pub location: Option<GeoPoint>,
    pub method: MarkingMethod,
}

/// `POST /api/v1/attendance/check-in`: 학생 단말이 스캔한 코드와 위치
#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    /// QR 코드에서 읽은 원문 (base64(JSON))
    pub payload: String,
    #[serde(default)]
    pub location: LocationReport,
}

/// `POST /api/v1/attendance/sessions/:id/records`: 교수의 수동 출석 처리
#[derive(Debug, Deserialize)]
pub struct ManualMarkRequest {
    pub student_id: String,
    pub status: AttendanceStatus,
}
