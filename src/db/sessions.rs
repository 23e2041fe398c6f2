//! # 출석 세션 데이터베이스 쿼리 모듈
//!
//! 출석 세션의 생성, 회전(nonce 교체), 조회, 비활성화를 담당하는 SQL 쿼리 함수들입니다.
//!
//! ## 세션 라이프사이클
//! ```text
//! [시작] create_session() → 활성(active = 1)
//!          ↓ rotate_session() 을 주기마다 반복 (nonce, expires_at, generation 교체)
//!        deactivate_session() → [종료]
//! ```
//!
//! 회전 쓰기는 화면 갱신과 별개로 비동기로 날아가기 때문에 도착 순서가 뒤바뀔 수 있습니다.
//! `generation`을 비교해서 더 오래된 쓰기는 무시합니다.

use crate::error::StoreError;
use crate::models::{AttendanceSession, NewSession};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;

const SESSION_COLUMNS: &str = r#"
    id, classroom_id, course_id, lecture_id, teacher_id, nonce,
    anchor_latitude, anchor_longitude, expires_at, active,
    counts_toward_total, generation, created_at, updated_at
"#;

/// 타임스탬프를 DB와 QR 페이로드에서 쓰는 형식("2026-02-16T12:00:00.000Z")으로 바꿉니다.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 새 출석 세션을 저장합니다. 세션 ID는 생성기가 미리 발급한 값을 그대로 씁니다.
pub async fn create_session(
    pool: &SqlitePool,
    session: &NewSession,
) -> Result<AttendanceSession, StoreError> {
    sqlx::query(
        r#"
        INSERT INTO attendance_sessions
            (id, classroom_id, course_id, lecture_id, teacher_id, nonce,
             anchor_latitude, anchor_longitude, expires_at, active, counts_toward_total, generation)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, 0)
        "#,
    )
    .bind(&session.id)
    .bind(&session.classroom_id)
    .bind(&session.course_id)
    .bind(session.lecture_id.as_deref())
    .bind(&session.teacher_id)
    .bind(&session.nonce)
    .bind(session.anchor.latitude)
    .bind(session.anchor.longitude)
    .bind(format_timestamp(session.expires_at))
    .bind(session.counts_toward_total)
    .execute(pool)
    .await?;

    get_session(pool, &session.id).await?.ok_or_else(|| {
        StoreError::Database(sqlx::Error::RowNotFound)
    })
}

/// ID로 세션 하나를 조회합니다. 비활성 세션도 포함합니다.
pub async fn get_session(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<AttendanceSession>, StoreError> {
    let session = sqlx::query_as::<_, AttendanceSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM attendance_sessions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// 활성 세션만 조회합니다. 체크인 검증은 항상 이 함수를 거칩니다.
pub async fn find_active_session(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<AttendanceSession>, StoreError> {
    let session = sqlx::query_as::<_, AttendanceSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM attendance_sessions WHERE id = ? AND active = 1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// 회전 결과(nonce, 만료 시각)를 기록합니다.
///
/// 저장된 `generation`보다 큰 값만 반영합니다.
/// 반환값이 `false`면 더 최신 회전이 이미 기록되어 있거나 세션이 비활성 상태입니다.
pub async fn rotate_session(
    pool: &SqlitePool,
    id: &str,
    nonce: &str,
    expires_at: DateTime<Utc>,
    generation: i64,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET nonce = ?,
            expires_at = ?,
            generation = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND active = 1 AND generation < ?
        "#,
    )
    .bind(nonce)
    .bind(format_timestamp(expires_at))
    .bind(generation)
    .bind(id)
    .bind(generation)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 세션을 비활성화합니다. 이미 비활성이면 `false`.
pub async fn deactivate_session(pool: &SqlitePool, id: &str) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET active = 0,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND active = 1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// 남아 있는 활성 세션을 모두 비활성화합니다. 서버 시작 시 호출합니다.
///
/// 타이머는 프로세스 메모리에만 있으므로 재시작 전의 세션은 더 이상 회전하지 않습니다.
pub async fn deactivate_orphaned_sessions(pool: &SqlitePool) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET active = 0,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE active = 1
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// 한 강의실의 세션 이력을 최신순으로 조회합니다.
pub async fn list_sessions_for_classroom(
    pool: &SqlitePool,
    classroom_id: &str,
) -> Result<Vec<AttendanceSession>, StoreError> {
    let sessions = sqlx::query_as::<_, AttendanceSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM attendance_sessions
         WHERE classroom_id = ?
         ORDER BY created_at DESC"
    ))
    .bind(classroom_id)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}
