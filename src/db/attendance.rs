//! # 출석 기록 데이터베이스 쿼리 모듈
//!
//! 출석 기록은 한 번 생성되면 수정/삭제하지 않습니다.
//! `(session_id, student_id)` 유니크 제약이 중복 체크인의 최종 방어선입니다.

use crate::error::StoreError;
use crate::models::{AttendanceRecord, NewAttendanceRecord};
use sqlx::SqlitePool;

const RECORD_COLUMNS: &str = r#"
    id, session_id, student_id, course_id, status,
    latitude, longitude, method, marked_at
"#;

/// 출석 기록을 추가합니다.
///
/// 같은 세션에 같은 학생의 기록이 이미 있으면 `StoreError::Duplicate`를 반환합니다.
pub async fn insert_record(
    pool: &SqlitePool,
    record: &NewAttendanceRecord,
) -> Result<AttendanceRecord, StoreError> {
    // UUIDv7: 시간순 정렬이 가능한 ID
    let id = uuid::Uuid::now_v7().to_string();

    sqlx::query(
        r#"
        INSERT INTO attendance_records
            (id, session_id, student_id, course_id, status, latitude, longitude, method)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&record.session_id)
    .bind(&record.student_id)
    .bind(&record.course_id)
    .bind(record.status)
    .bind(record.location.map(|p| p.latitude))
    .bind(record.location.map(|p| p.longitude))
    .bind(record.method)
    .execute(pool)
    .await
    .map_err(StoreError::classify)?;

    let created = sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM attendance_records WHERE id = ?"
    ))
    .bind(&id)
    .fetch_one(pool)
    .await?;

    Ok(created)
}

/// 세션에 기록된 출석 인원 수
pub async fn count_for_session(pool: &SqlitePool, session_id: &str) -> Result<i64, StoreError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM attendance_records WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn exists_for(
    pool: &SqlitePool,
    session_id: &str,
    student_id: &str,
) -> Result<bool, StoreError> {
    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT EXISTS(SELECT 1 FROM attendance_records WHERE session_id = ? AND student_id = ?)",
    )
    .bind(session_id)
    .bind(student_id)
    .fetch_one(pool)
    .await?;

    Ok(exists != 0)
}

/// 세션의 출석 기록 목록 (기록된 순서)
pub async fn list_for_session(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<AttendanceRecord>, StoreError> {
    let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM attendance_records
         WHERE session_id = ?
         ORDER BY marked_at ASC"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// 학생 본인의 출석 이력 (최신순)
pub async fn list_for_student(
    pool: &SqlitePool,
    student_id: &str,
) -> Result<Vec<AttendanceRecord>, StoreError> {
    let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM attendance_records
         WHERE student_id = ?
         ORDER BY marked_at DESC"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}
