//! 요청 전처리: JWT 인증 추출기
pub mod auth;
