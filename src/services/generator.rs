//! # QR 코드 생성기 (교사 측)
//!
//! 교사 단말의 위치에 고정된 출석 세션을 열고, 일정 주기마다 새 코드를 발급하며,
//! 출석 인원을 주기적으로 집계합니다.
//!
//! ## 상태 흐름
//! ```text
//! RequestingLocation ──위치 획득──▶ Confirm ──강의 수 포함 여부 선택──▶ Generating
//!        ▲  │ 실패 시 그대로 머무름 (위치 없이 시작하지 않음)                  │ 세션 ID/nonce 발급
//!        └──┘                                                              ▼
//!                                     Stopped ◀──교사가 종료── Active (1초 카운트다운 + 3초 폴링)
//! ```
//!
//! ## 화면 상태와 저장 상태
//! - `RotationState`: 교사 화면에 보이는 값. 회전은 여기서 먼저 일어나고 즉시 보입니다.
//! - `DurableState`: 저장소가 실제로 확인한 값. 회전 쓰기가 끝날 때마다 `reconcile()`로 맞춥니다.
//!
//! 회전 쓰기는 별도 태스크로 띄우기 때문에 느리거나 실패해도 화면 갱신을 막지 않습니다.
//! 실패는 `warn!`으로 남기고 `last_persist_error`에 보관합니다.
//!
//! 회전 타이머와 폴링 타이머는 `GeneratorHandle`이 소유합니다.
//! 핸들을 종료하거나 drop하면 두 타이머가 함께 취소됩니다.
//!
//! 교사 화면이 `view()`를 더 이상 부르지 않으면(탭을 닫았거나 단말이 꺼짐) 화면이 사라진 것으로 봅니다.
//! 코드 창 `idle_windows`개 동안 조회가 없으면 회전 타이머가 세션을 스스로 종료합니다.

use crate::config::AttendancePolicy;
use crate::error::{AppError, StoreError};
use crate::models::{
    GeoPoint, GeolocationError, LiveSessionView, NewSession, StartSessionRequest, StoppedSession,
};
use crate::services::nonce::{generate_nonce, new_session_id};
use crate::services::payload::ScanPayload;
use crate::services::store::AttendanceStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

/// 카운트다운 한 칸
const TICK: Duration = Duration::from_secs(1);

/// 생성기 화면의 단계
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorPhase {
    RequestingLocation,
    Confirm { anchor: GeoPoint },
    Generating { anchor: GeoPoint, counts_toward_total: bool },
    Active { session_id: String },
    Stopped { session_id: String, final_count: i64 },
}

impl GeneratorPhase {
    pub fn name(&self) -> &'static str {
        match self {
            GeneratorPhase::RequestingLocation => "requesting_location",
            GeneratorPhase::Confirm { .. } => "confirm",
            GeneratorPhase::Generating { .. } => "generating",
            GeneratorPhase::Active { .. } => "active",
            GeneratorPhase::Stopped { .. } => "stopped",
        }
    }

    /// 위치 조회 결과를 반영합니다. 실패하면 `RequestingLocation`에 그대로 머뭅니다.
    pub fn located(&mut self, fix: Result<GeoPoint, GeolocationError>) -> Result<(), AppError> {
        match self {
            GeneratorPhase::RequestingLocation => {
                *self = GeneratorPhase::Confirm { anchor: fix? };
                Ok(())
            }
            _ => Err(self.invalid("located")),
        }
    }

    pub fn confirm(&mut self, counts_toward_total: bool) -> Result<(), AppError> {
        match *self {
            GeneratorPhase::Confirm { anchor } => {
                *self = GeneratorPhase::Generating {
                    anchor,
                    counts_toward_total,
                };
                Ok(())
            }
            _ => Err(self.invalid("confirm")),
        }
    }

    pub fn activate(&mut self, session_id: String) -> Result<(), AppError> {
        match self {
            GeneratorPhase::Generating { .. } => {
                *self = GeneratorPhase::Active { session_id };
                Ok(())
            }
            _ => Err(self.invalid("activate")),
        }
    }

    pub fn stop(&mut self, final_count: i64) -> Result<(), AppError> {
        match self {
            GeneratorPhase::Active { session_id } => {
                let session_id = std::mem::take(session_id);
                *self = GeneratorPhase::Stopped {
                    session_id,
                    final_count,
                };
                Ok(())
            }
            _ => Err(self.invalid("stop")),
        }
    }

    fn invalid(&self, action: &str) -> AppError {
        AppError::Conflict(format!("Cannot {} while {}", action, self.name()))
    }
}

/// 저장소에 기록해야 할 회전 한 건
#[derive(Debug, Clone)]
pub struct Rotation {
    pub session_id: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
    pub generation: u64,
}

/// 교사 화면에 보이는 코드 상태 (화면 상태)
#[derive(Debug, Clone)]
pub struct RotationState {
    payload: ScanPayload,
    code: String,
    window_secs: u32,
    seconds_remaining: u32,
    generation: u64,
}

impl RotationState {
    /// 첫 코드를 만듭니다. 저장 결과를 기다리지 않고 바로 보여줄 수 있습니다.
    pub fn new(session_id: String, nonce: String, now: DateTime<Utc>, window_secs: u32) -> Self {
        let window_secs = window_secs.max(1);
        let payload = ScanPayload::new(session_id, nonce, now + window(window_secs));
        Self {
            code: payload.encode(),
            payload,
            window_secs,
            seconds_remaining: window_secs,
            generation: 0,
        }
    }

    /// 1초 카운트다운. 0이 되면 새 nonce와 만료 시각을 발급하고 저장할 회전을 돌려줍니다.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Rotation> {
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining > 0 {
            return None;
        }
        Some(self.rotate(now))
    }

    fn rotate(&mut self, now: DateTime<Utc>) -> Rotation {
        self.generation += 1;
        self.payload = ScanPayload::new(
            self.payload.session_id.clone(),
            generate_nonce(),
            now + window(self.window_secs),
        );
        self.code = self.payload.encode();
        self.seconds_remaining = self.window_secs;

        Rotation {
            session_id: self.payload.session_id.clone(),
            nonce: self.payload.nonce.clone(),
            expires_at: self.payload.expires_at,
            generation: self.generation,
        }
    }

    pub fn payload(&self) -> &ScanPayload {
        &self.payload
    }

    /// QR 코드로 렌더링할 문자열
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn window(secs: u32) -> chrono::Duration {
    chrono::Duration::seconds(i64::from(secs))
}

/// 저장소가 확인한 상태 (저장 상태)
#[derive(Debug, Default, Clone)]
pub struct DurableState {
    confirmed_generation: Option<u64>,
    last_error: Option<String>,
}

impl DurableState {
    /// 회전 쓰기 결과를 반영합니다. 실패는 버리지 않고 로그와 `last_error`에 남깁니다.
    pub fn reconcile(&mut self, rotation: &Rotation, result: &Result<bool, StoreError>) {
        match result {
            Ok(true) => {
                // 늦게 도착한 옛 회전이 확인 번호를 되돌리지 않도록 최댓값만 유지
                let confirmed = self.confirmed_generation.unwrap_or(0).max(rotation.generation);
                self.confirmed_generation = Some(confirmed);
                self.last_error = None;
            }
            Ok(false) => {
                tracing::debug!(
                    session_id = %rotation.session_id,
                    generation = rotation.generation,
                    "rotation superseded or session inactive"
                );
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %rotation.session_id,
                    generation = rotation.generation,
                    error = %e,
                    "failed to persist code rotation"
                );
                self.last_error = Some(e.to_string());
            }
        }
    }

    pub fn confirm_initial(&mut self) {
        self.confirmed_generation = Some(self.confirmed_generation.unwrap_or(0));
    }

    pub fn confirmed_generation(&self) -> Option<u64> {
        self.confirmed_generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// 실행 중인 세션 하나의 공유 상태. 타이머 태스크와 핸들러가 함께 봅니다.
#[derive(Debug)]
pub struct LiveSession {
    pub session_id: String,
    pub classroom_id: String,
    pub teacher_id: String,
    display: RwLock<RotationState>,
    durable: Mutex<DurableState>,
    attendee_count: AtomicI64,
    last_viewed: Mutex<Instant>,
}

impl LiveSession {
    /// 교사 화면용 현재 상태. 호출 시각을 마지막 조회 시각으로 기록합니다.
    pub async fn view(&self) -> LiveSessionView {
        *self.last_viewed.lock().await = Instant::now();
        let display = self.display.read().await;
        let durable = self.durable.lock().await;
        LiveSessionView {
            session_id: self.session_id.clone(),
            code: display.code().to_string(),
            expires_at: crate::db::format_timestamp(display.payload().expires_at),
            seconds_remaining: display.seconds_remaining(),
            generation: display.generation(),
            attendee_count: self.attendee_count.load(Ordering::Relaxed),
            confirmed_generation: durable.confirmed_generation(),
            last_persist_error: durable.last_error().map(str::to_string),
        }
    }

    async fn unobserved_for(&self) -> Duration {
        self.last_viewed.lock().await.elapsed()
    }

    #[cfg(test)]
    pub async fn current_payload(&self) -> ScanPayload {
        self.display.read().await.payload().clone()
    }

    #[cfg(test)]
    pub fn attendee_count(&self) -> i64 {
        self.attendee_count.load(Ordering::Relaxed)
    }
}

/// 회전/폴링 타이머를 소유하는 핸들. drop되면 두 타이머가 함께 취소됩니다.
pub struct GeneratorHandle {
    live: Arc<LiveSession>,
    rotation_task: JoinHandle<()>,
    poll_task: JoinHandle<()>,
}

impl GeneratorHandle {
    pub fn live(&self) -> &Arc<LiveSession> {
        &self.live
    }

    fn cancel(&self) {
        self.rotation_task.abort();
        self.poll_task.abort();
    }

    #[cfg(test)]
    fn timers_finished(&self) -> bool {
        self.rotation_task.is_finished() && self.poll_task.is_finished()
    }
}

impl Drop for GeneratorHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn spawn_rotation<S: AttendanceStore>(
    generators: Generators<S>,
    live: Arc<LiveSession>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let store = generators.store.clone();
        let idle_timeout = generators.policy.idle_timeout();
        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let unobserved = live.unobserved_for().await;
            if unobserved >= idle_timeout {
                tracing::info!(
                    "Attendance session {} not viewed for {}s, stopping",
                    live.session_id,
                    unobserved.as_secs()
                );
                // stop()이 이 태스크를 abort하므로 종료는 별도 태스크에서 진행합니다
                let id = live.session_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = generators.retire(&id).await {
                        tracing::warn!("Failed to stop idle attendance session {}: {}", id, e);
                    }
                });
                break;
            }

            let rotation = live.display.write().await.tick(Utc::now());
            let Some(rotation) = rotation else {
                continue;
            };

            tracing::debug!(
                "Rotated code for session {} (generation {})",
                rotation.session_id,
                rotation.generation
            );

            // 화면은 이미 새 코드를 보여주고 있습니다. 저장은 기다리지 않습니다.
            let store = store.clone();
            let live = Arc::clone(&live);
            tokio::spawn(async move {
                let result = store
                    .rotate_session(
                        &rotation.session_id,
                        &rotation.nonce,
                        rotation.expires_at,
                        rotation.generation as i64,
                    )
                    .await;
                live.durable.lock().await.reconcile(&rotation, &result);
            });
        }
    })
}

fn spawn_poll<S: AttendanceStore>(
    store: S,
    live: Arc<LiveSession>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.count_attendance(&live.session_id).await {
                Ok(count) => live.attendee_count.store(count, Ordering::Relaxed),
                Err(e) => tracing::warn!(
                    session_id = %live.session_id,
                    error = %e,
                    "failed to poll attendee count"
                ),
            }
        }
    })
}

/// 교사 측 생성기 관리자
///
/// 세션마다 `GeneratorHandle` 하나를 보관합니다. 같은 강의실에서 새 세션을 시작하면
/// 기존 활성 세션은 종료합니다.
#[derive(Clone)]
pub struct Generators<S: AttendanceStore> {
    store: S,
    policy: AttendancePolicy,
    running: Arc<Mutex<HashMap<String, GeneratorHandle>>>,
}

impl<S: AttendanceStore> Generators<S> {
    pub fn new(store: S, policy: AttendancePolicy) -> Self {
        Self {
            store,
            policy,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 세션을 시작하고 첫 코드를 돌려줍니다.
    ///
    /// 위치가 없으면 `AppError::Geolocation`으로 실패합니다 (fail closed).
    pub async fn start(
        &self,
        teacher_id: &str,
        req: StartSessionRequest,
    ) -> Result<LiveSessionView, AppError> {
        let mut phase = GeneratorPhase::RequestingLocation;
        phase.located(req.location.into_result())?;
        phase.confirm(req.counts_toward_total)?;

        let GeneratorPhase::Generating {
            anchor,
            counts_toward_total,
        } = phase
        else {
            return Err(AppError::Internal("generator did not reach generating".to_string()));
        };

        // 세션 ID와 첫 nonce는 저장 전에 바로 발급합니다
        let session_id = new_session_id();
        let display = RotationState::new(
            session_id.clone(),
            generate_nonce(),
            Utc::now(),
            self.policy.code_window_secs,
        );

        self.supersede_classroom(&req.classroom_id).await?;

        self.store
            .create_session(&NewSession {
                id: session_id.clone(),
                classroom_id: req.classroom_id.clone(),
                course_id: req.course_id,
                lecture_id: req.lecture_id,
                teacher_id: teacher_id.to_string(),
                nonce: display.payload().nonce.clone(),
                anchor,
                expires_at: display.payload().expires_at,
                counts_toward_total,
            })
            .await?;
        phase.activate(session_id.clone())?;

        let mut durable = DurableState::default();
        durable.confirm_initial();

        let live = Arc::new(LiveSession {
            session_id: session_id.clone(),
            classroom_id: req.classroom_id,
            teacher_id: teacher_id.to_string(),
            display: RwLock::new(display),
            durable: Mutex::new(durable),
            attendee_count: AtomicI64::new(0),
            last_viewed: Mutex::new(Instant::now()),
        });

        let handle = GeneratorHandle {
            rotation_task: spawn_rotation(self.clone(), Arc::clone(&live)),
            poll_task: spawn_poll(self.store.clone(), Arc::clone(&live), self.policy.poll_interval),
            live: Arc::clone(&live),
        };
        self.running.lock().await.insert(session_id.clone(), handle);

        tracing::info!(
            "Attendance session {} started in classroom {} by {} ({})",
            session_id,
            live.classroom_id,
            teacher_id,
            phase.name()
        );

        Ok(live.view().await)
    }

    /// 실행 중인 세션의 공유 상태
    pub async fn live(&self, session_id: &str) -> Option<Arc<LiveSession>> {
        self.running
            .lock()
            .await
            .get(session_id)
            .map(|handle| Arc::clone(handle.live()))
    }

    pub async fn running_count(&self) -> usize {
        self.running.lock().await.len()
    }

    /// 세션을 종료합니다. 두 타이머를 취소하고 세션을 비활성화한 뒤 최종 인원을 돌려줍니다.
    pub async fn stop(&self, session_id: &str) -> Result<StoppedSession, AppError> {
        let handle = self.running.lock().await.remove(session_id);
        let was_running = handle.is_some();
        // drop → 타이머 취소
        drop(handle);

        let deactivated = self.store.deactivate_session(session_id).await?;
        if !was_running && !deactivated {
            return Err(AppError::NotFound);
        }

        let final_count = self.store.count_attendance(session_id).await?;

        let mut phase = GeneratorPhase::Active {
            session_id: session_id.to_string(),
        };
        phase.stop(final_count)?;
        tracing::info!(
            "Attendance session {} stopped with {} attendee(s)",
            session_id,
            final_count
        );

        Ok(StoppedSession {
            session_id: session_id.to_string(),
            final_count,
        })
    }

    /// 모든 세션 종료 (서버 종료 시)
    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.running.lock().await.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                tracing::warn!("Failed to stop attendance session {}: {}", id, e);
            }
        }
    }

    /// 같은 강의실에서 실행 중인 세션을 종료합니다. 강의실당 활성 세션은 하나만 둡니다.
    async fn supersede_classroom(&self, classroom_id: &str) -> Result<(), AppError> {
        let previous: Vec<String> = self
            .running
            .lock()
            .await
            .values()
            .filter(|handle| handle.live().classroom_id == classroom_id)
            .map(|handle| handle.live().session_id.clone())
            .collect();

        for id in previous {
            tracing::info!("Superseding attendance session {} in classroom {}", id, classroom_id);
            self.retire(&id).await?;
        }
        Ok(())
    }

    /// 세션을 종료하되, 그 사이 다른 경로로 이미 종료되었으면 성공으로 봅니다.
    async fn retire(&self, session_id: &str) -> Result<(), AppError> {
        match self.stop(session_id).await {
            Ok(_) | Err(AppError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationReport, NewAttendanceRecord};
    use crate::models::{AttendanceStatus, MarkingMethod};
    use crate::services::store::SqliteStore;
    use crate::test_support::memory_pool;
    use chrono::TimeZone;

    fn start_request(classroom: &str, location: LocationReport) -> StartSessionRequest {
        StartSessionRequest {
            classroom_id: classroom.to_string(),
            course_id: "course-1".to_string(),
            lecture_id: None,
            location,
            counts_toward_total: true,
        }
    }

    fn anchor() -> GeoPoint {
        GeoPoint::new(12.9716, 77.5946)
    }

    #[test]
    fn phases_follow_the_happy_path() {
        let mut phase = GeneratorPhase::RequestingLocation;
        phase.located(Ok(anchor())).unwrap();
        assert_eq!(phase, GeneratorPhase::Confirm { anchor: anchor() });

        phase.confirm(false).unwrap();
        assert_eq!(
            phase,
            GeneratorPhase::Generating {
                anchor: anchor(),
                counts_toward_total: false
            }
        );

        phase.activate("s-1".to_string()).unwrap();
        phase.stop(7).unwrap();
        assert_eq!(
            phase,
            GeneratorPhase::Stopped {
                session_id: "s-1".to_string(),
                final_count: 7
            }
        );
    }

    #[test]
    fn location_failure_stays_in_requesting_location() {
        let mut phase = GeneratorPhase::RequestingLocation;
        let err = phase.located(Err(GeolocationError::PermissionDenied)).unwrap_err();
        assert!(matches!(err, AppError::Geolocation(GeolocationError::PermissionDenied)));
        assert_eq!(phase, GeneratorPhase::RequestingLocation);

        // retry succeeds
        phase.located(Ok(anchor())).unwrap();
        assert_eq!(phase.name(), "confirm");
    }

    #[test]
    fn out_of_order_transitions_are_rejected() {
        let mut phase = GeneratorPhase::RequestingLocation;
        assert!(phase.confirm(true).is_err());
        assert!(phase.activate("s".to_string()).is_err());
        assert!(phase.stop(0).is_err());
        assert_eq!(phase, GeneratorPhase::RequestingLocation);
    }

    #[test]
    fn fifteen_ticks_rotate_the_nonce() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut state = RotationState::new("s-1".to_string(), generate_nonce(), start, 15);
        let first_nonce = state.payload().nonce.clone();
        assert_eq!(state.payload().expires_at, start + chrono::Duration::seconds(15));

        for second in 1..15 {
            let now = start + chrono::Duration::seconds(second);
            assert!(state.tick(now).is_none());
            assert_eq!(state.seconds_remaining(), 15 - second as u32);
        }

        let now = start + chrono::Duration::seconds(15);
        let rotation = state.tick(now).expect("rotation at tick 15");
        assert_ne!(rotation.nonce, first_nonce);
        assert_eq!(rotation.generation, 1);
        assert_eq!(rotation.expires_at, now + chrono::Duration::seconds(15));
        assert_eq!(state.seconds_remaining(), 15);
        assert_eq!(ScanPayload::decode(state.code()).unwrap(), *state.payload());
    }

    #[test]
    fn reconcile_keeps_highest_confirmed_generation_and_logs_failures() {
        let rotation = |generation| Rotation {
            session_id: "s-1".to_string(),
            nonce: "n".to_string(),
            expires_at: Utc::now(),
            generation,
        };
        let mut durable = DurableState::default();

        durable.reconcile(&rotation(2), &Ok(true));
        durable.reconcile(&rotation(1), &Ok(true));
        assert_eq!(durable.confirmed_generation(), Some(2));

        durable.reconcile(&rotation(3), &Err(StoreError::Database(sqlx::Error::PoolClosed)));
        assert_eq!(durable.confirmed_generation(), Some(2));
        assert!(durable.last_error().is_some());

        durable.reconcile(&rotation(4), &Ok(true));
        assert_eq!(durable.confirmed_generation(), Some(4));
        assert!(durable.last_error().is_none());
    }

    #[tokio::test]
    async fn start_without_location_fails_closed() {
        let pool = memory_pool().await;
        let generators = Generators::new(SqliteStore::new(pool.clone()), AttendancePolicy::default());

        let err = generators
            .start("teacher-1", start_request("room-a", LocationReport::failed(GeolocationError::Timeout)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Geolocation(GeolocationError::Timeout)));

        let err = generators
            .start("teacher-1", start_request("room-a", LocationReport::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Geolocation(GeolocationError::PositionUnavailable)));

        let sessions = crate::db::list_sessions_for_classroom(&pool, "room-a").await.unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn start_persists_session_and_returns_first_code() {
        let pool = memory_pool().await;
        let store = SqliteStore::new(pool.clone());
        let generators = Generators::new(store.clone(), AttendancePolicy::default());

        let view = generators
            .start("teacher-1", start_request("room-a", LocationReport::fix(anchor())))
            .await
            .unwrap();
        assert_eq!(view.seconds_remaining, 15);
        assert_eq!(view.generation, 0);
        assert_eq!(view.confirmed_generation, Some(0));

        let payload = ScanPayload::decode(&view.code).unwrap();
        let session = store.find_active_session(&view.session_id).await.unwrap().unwrap();
        assert_eq!(session.nonce, payload.nonce);
        assert_eq!(session.anchor(), anchor());
        assert_eq!(session.teacher_id, "teacher-1");

        let stopped = generators.stop(&view.session_id).await.unwrap();
        assert_eq!(stopped.final_count, 0);
    }

    #[tokio::test]
    async fn rotation_timer_updates_display_and_store() {
        let pool = memory_pool().await;
        let store = SqliteStore::new(pool.clone());
        let policy = AttendancePolicy {
            code_window_secs: 1,
            poll_interval: Duration::from_millis(100),
            ..AttendancePolicy::default()
        };
        let generators = Generators::new(store.clone(), policy);

        let view = generators
            .start("teacher-1", start_request("room-a", LocationReport::fix(anchor())))
            .await
            .unwrap();
        let first = ScanPayload::decode(&view.code).unwrap();

        store
            .insert_attendance(&NewAttendanceRecord {
                session_id: view.session_id.clone(),
                student_id: "stu-1".to_string(),
                course_id: "course-1".to_string(),
                status: AttendanceStatus::Present,
                location: None,
                method: MarkingMethod::QrScan,
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let live = generators.live(&view.session_id).await.unwrap();
        let current = live.current_payload().await;
        assert_ne!(current.nonce, first.nonce);
        assert_eq!(live.attendee_count(), 1);

        let stored = store.find_active_session(&view.session_id).await.unwrap().unwrap();
        assert!(stored.generation >= 1);

        let stopped = generators.stop(&view.session_id).await.unwrap();
        assert_eq!(stopped.final_count, 1);
        assert!(generators.live(&view.session_id).await.is_none());
        assert!(store.find_active_session(&view.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_rotation_write_does_not_block_display() {
        let pool = memory_pool().await;
        let store = SqliteStore::new(pool.clone());
        let policy = AttendancePolicy {
            code_window_secs: 1,
            ..AttendancePolicy::default()
        };
        let generators = Generators::new(store, policy);
        let view = generators
            .start("teacher-1", start_request("room-a", LocationReport::fix(anchor())))
            .await
            .unwrap();

        pool.close().await;
        tokio::time::sleep(Duration::from_millis(1_300)).await;

        let live = generators.live(&view.session_id).await.unwrap();
        let now = live.view().await;
        assert!(now.generation >= 1);
        assert_ne!(now.code, view.code);
        assert_eq!(now.confirmed_generation, Some(0));
        assert!(now.last_persist_error.is_some());
    }

    #[tokio::test]
    async fn stopping_cancels_both_timers() {
        let pool = memory_pool().await;
        let generators = Generators::new(SqliteStore::new(pool), AttendancePolicy::default());
        let view = generators
            .start("teacher-1", start_request("room-a", LocationReport::fix(anchor())))
            .await
            .unwrap();

        let handle = generators.running.lock().await.remove(&view.session_id).unwrap();
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.timers_finished());
    }

    #[tokio::test]
    async fn new_session_supersedes_previous_in_same_classroom() {
        let pool = memory_pool().await;
        let store = SqliteStore::new(pool);
        let generators = Generators::new(store.clone(), AttendancePolicy::default());

        let first = generators
            .start("teacher-1", start_request("room-a", LocationReport::fix(anchor())))
            .await
            .unwrap();
        let other_room = generators
            .start("teacher-2", start_request("room-b", LocationReport::fix(anchor())))
            .await
            .unwrap();
        let second = generators
            .start("teacher-1", start_request("room-a", LocationReport::fix(anchor())))
            .await
            .unwrap();

        assert!(store.find_active_session(&first.session_id).await.unwrap().is_none());
        assert!(store.find_active_session(&second.session_id).await.unwrap().is_some());
        assert!(store.find_active_session(&other_room.session_id).await.unwrap().is_some());

        generators.stop_all().await;
        assert!(generators.live(&second.session_id).await.is_none());
    }

    #[tokio::test]
    async fn stopping_unknown_session_is_not_found() {
        let pool = memory_pool().await;
        let generators = Generators::new(SqliteStore::new(pool), AttendancePolicy::default());
        assert!(matches!(generators.stop("missing").await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn retiring_an_already_stopped_session_succeeds() {
        let pool = memory_pool().await;
        let generators = Generators::new(SqliteStore::new(pool), AttendancePolicy::default());
        let view = generators
            .start("teacher-1", start_request("room-a", LocationReport::fix(anchor())))
            .await
            .unwrap();

        // 교사의 종료 요청이 먼저 처리된 경우
        generators.stop(&view.session_id).await.unwrap();
        generators.retire(&view.session_id).await.unwrap();
        generators.retire("never-existed").await.unwrap();

        let next = generators
            .start("teacher-1", start_request("room-a", LocationReport::fix(anchor())))
            .await
            .unwrap();
        assert!(generators.live(&next.session_id).await.is_some());
        generators.stop_all().await;
    }

    #[tokio::test]
    async fn unviewed_generator_stops_itself() {
        let pool = memory_pool().await;
        let store = SqliteStore::new(pool);
        let policy = AttendancePolicy {
            code_window_secs: 1,
            idle_windows: 2,
            ..AttendancePolicy::default()
        };
        let generators = Generators::new(store.clone(), policy);

        let watched = generators
            .start("teacher-1", start_request("room-a", LocationReport::fix(anchor())))
            .await
            .unwrap();
        let abandoned = generators
            .start("teacher-2", start_request("room-b", LocationReport::fix(anchor())))
            .await
            .unwrap();

        for _ in 0..8 {
            tokio::time::sleep(Duration::from_millis(500)).await;
            generators.live(&watched.session_id).await.unwrap().view().await;
        }

        assert!(generators.live(&abandoned.session_id).await.is_none());
        assert!(store.find_active_session(&abandoned.session_id).await.unwrap().is_none());
        assert!(store.find_active_session(&watched.session_id).await.unwrap().is_some());
        assert_eq!(generators.running_count().await, 1);

        generators.stop_all().await;
    }
}
