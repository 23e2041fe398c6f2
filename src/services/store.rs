//! # 출석 저장소 경계
//!
//! 생성기와 체크인 검증이 사용하는 저장소 연산을 트레이트로 묶었습니다.
//! 실제 구현은 SQLite(`SqliteStore`)이며, 각 메서드는 `db::` 쿼리 함수를 그대로 호출합니다.
//!
//! 트레이트 메서드는 `Send` 퓨처를 돌려주도록 선언되어 있어서
//! `tokio::spawn`으로 띄운 회전/폴링 타이머 안에서도 쓸 수 있습니다.

use crate::db;
use crate::error::StoreError;
use crate::models::{AttendanceRecord, AttendanceSession, NewAttendanceRecord, NewSession};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::future::Future;

pub trait AttendanceStore: Clone + Send + Sync + 'static {
    fn create_session(
        &self,
        session: &NewSession,
    ) -> impl Future<Output = Result<AttendanceSession, StoreError>> + Send;

    /// 회전 결과 기록. 더 최신 generation이 이미 있으면 `Ok(false)`.
    fn rotate_session(
        &self,
        id: &str,
        nonce: &str,
        expires_at: DateTime<Utc>,
        generation: i64,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn find_active_session(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<AttendanceSession>, StoreError>> + Send;

    fn deactivate_session(&self, id: &str)
        -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn count_attendance(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    fn attendance_exists(
        &self,
        session_id: &str,
        student_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// 기록 추가. `(session_id, student_id)` 중복이면 `StoreError::Duplicate`.
    fn insert_attendance(
        &self,
        record: &NewAttendanceRecord,
    ) -> impl Future<Output = Result<AttendanceRecord, StoreError>> + Send;
}

/// SQLite 연결 풀 위의 저장소 구현
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AttendanceStore for SqliteStore {
    async fn create_session(&self, session: &NewSession) -> Result<AttendanceSession, StoreError> {
        db::create_session(&self.pool, session).await
    }

    async fn rotate_session(
        &self,
        id: &str,
        nonce: &str,
        expires_at: DateTime<Utc>,
        generation: i64,
    ) -> Result<bool, StoreError> {
        db::rotate_session(&self.pool, id, nonce, expires_at, generation).await
    }

    async fn find_active_session(&self, id: &str) -> Result<Option<AttendanceSession>, StoreError> {
        db::find_active_session(&self.pool, id).await
    }

    async fn deactivate_session(&self, id: &str) -> Result<bool, StoreError> {
        db::deactivate_session(&self.pool, id).await
    }

    async fn count_attendance(&self, session_id: &str) -> Result<i64, StoreError> {
        db::count_for_session(&self.pool, session_id).await
    }

    async fn attendance_exists(&self, session_id: &str, student_id: &str) -> Result<bool, StoreError> {
        db::exists_for(&self.pool, session_id, student_id).await
    }

    async fn insert_attendance(
        &self,
        record: &NewAttendanceRecord,
    ) -> Result<AttendanceRecord, StoreError> {
        db::insert_record(&self.pool, record).await
    }
}
