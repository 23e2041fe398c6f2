//! # 헬스체크(Health Check) 핸들러
//!
//! ## 엔드포인트
//! - `GET /api/v1/health` → `{ "status": "ok", "active_sessions": 2 }`
//!
//! 로드밸런서나 컨테이너 헬스체크에서 호출합니다.
//! `active_sessions`는 이 프로세스에서 QR 코드를 회전 중인 세션 수입니다.

use crate::routes::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// `GET /health`: 서버 상태를 확인합니다. 실패하지 않습니다.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "active_sessions": state.generators.running_count().await
    }))
}
