//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 출석 프로토콜 쪽에서는 `services::store::SqliteStore`가 이 함수들을 감싸서 사용하고,
//! 라우트 핸들러는 조회성 쿼리를 직접 호출합니다.
//!
//! 각 하위 모듈:
//! - `attendance`: 출석 기록 추가/집계/조회
//! - `sessions`: 출석 세션 생성/회전/비활성화
//! - `users`: 사용자 인증 관련 쿼리

pub mod attendance;
pub mod sessions;
pub mod users;

pub use attendance::*;
pub use sessions::*;
