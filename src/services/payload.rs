//! # QR 스캔 페이로드 코덱
//!
//! QR 코드에 담기는 문자열의 형식입니다.
//!
//! ```text
//! base64( {"sid":"<세션 ID>","nonce":"<nonce>","exp":"2026-02-16T12:00:15.000Z"} )
//! ```
//!
//! 디코딩 순서: base64 → JSON → 세 필드 존재 확인 → `exp` 날짜 파싱.
//! 어느 단계에서든 실패하면 `PayloadError`를 돌려줍니다.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload field `{0}` is missing or empty")]
    MissingField(&'static str),
    #[error("payload expiry `{0}` is not a valid timestamp")]
    InvalidExpiry(String),
}

/// QR 코드 한 장에 담기는 값. 저장하지 않고 회전마다 새로 만듭니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPayload {
    pub session_id: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

/// JSON 와이어 형식. 필드 이름은 클라이언트와 맞춰야 합니다.
#[derive(Serialize, Deserialize)]
struct Wire {
    #[serde(default)]
    sid: String,
    #[serde(default)]
    nonce: String,
    #[serde(default)]
    exp: String,
}

impl ScanPayload {
    pub fn new(session_id: impl Into<String>, nonce: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            nonce: nonce.into(),
            expires_at,
        }
    }

    pub fn encode(&self) -> String {
        let wire = Wire {
            sid: self.session_id.clone(),
            nonce: self.nonce.clone(),
            exp: self.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        // 문자열 세 개짜리 구조체라 직렬화가 실패할 일은 없습니다
        let json = serde_json::to_vec(&wire).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        let bytes = STANDARD.decode(raw.trim())?;
        let wire: Wire = serde_json::from_slice(&bytes)?;

        if wire.sid.is_empty() {
            return Err(PayloadError::MissingField("sid"));
        }
        if wire.nonce.is_empty() {
            return Err(PayloadError::MissingField("nonce"));
        }
        if wire.exp.is_empty() {
            return Err(PayloadError::MissingField("exp"));
        }

        let expires_at = DateTime::parse_from_rfc3339(&wire.exp)
            .map_err(|_| PayloadError::InvalidExpiry(wire.exp.clone()))?
            .with_timezone(&Utc);

        Ok(Self {
            session_id: wire.sid,
            nonce: wire.nonce,
            expires_at,
        })
    }

    /// `now`가 만료 시각을 지났으면 true. 만료 시각과 정확히 같은 순간은 아직 유효합니다.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
