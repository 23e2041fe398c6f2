use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand_core::{OsRng, RngCore};

const NONCE_BYTES: usize = 16;

/// QR 코드에 넣을 불투명 토큰. OS 난수 16바이트를 URL-safe base64로 인코딩합니다.
pub fn generate_nonce() -> String {
    let mut buf = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// 생성기가 저장 전에 바로 발급하는 세션 ID
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
