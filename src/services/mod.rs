//! # 비즈니스 로직 모듈
//!
//! QR 출석 프로토콜의 핵심 로직입니다.
//! - `access`: 역할별 허용 동작 표
//! - `generator`: 교사 측 코드 생성기 (세션 시작, nonce 회전, 인원 폴링, 종료)
//! - `geo`: 하버사인 거리 계산
//! - `nonce`: 세션 ID / nonce 발급
//! - `payload`: QR 페이로드 base64(JSON) 코덱
//! - `scanner`: 학생 측 체크인 검증과 스캐너 상태
//! - `store`: 세션/출석 저장소 트레이트와 SQLite 구현

pub mod access;
pub mod generator;
pub mod geo;
pub mod nonce;
pub mod payload;
pub mod scanner;
pub mod store;
