//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! 각 하위 모듈은 특정 도메인의 데이터 타입을 담당합니다:
//! - `attendance`: 출석 기록과 체크인/수동 처리 요청
//! - `geo`: 위도/경도와 위치 조회 실패 분류
//! - `session`: QR 출석 세션과 교사 화면용 실시간 상태
//! - `user`: 사용자(User)와 역할(Role)
//!
//! `pub use X::*;`로 하위 모듈의 공개 항목을 재공개하여
//! `crate::models::AttendanceSession`처럼 짧게 접근할 수 있게 합니다.

pub mod attendance;
pub mod geo;
pub mod session;
pub mod user;

pub use attendance::*;
pub use geo::*;
pub use session::*;
pub use user::*;
