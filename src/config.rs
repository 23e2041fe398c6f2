//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값과 출석 정책을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 서버 설정 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (필수)
//! - `JWT_SECRET`: JWT 토큰 서명에 사용할 비밀키 (필수)
//! - `HOST`, `PORT`: 서버 바인딩 주소
//!
//! 출석 정책 항목 (모두 선택, 괄호 안은 기본값):
//! - `ATTENDANCE_CODE_WINDOW_SECS` (15): QR 코드 하나가 유효한 시간, 곧 회전 주기
//! - `ATTENDANCE_POLL_INTERVAL_SECS` (3): 출석 인원 폴링 주기
//! - `ATTENDANCE_GEOFENCE_RADIUS_M` (50): 교사 위치로부터 허용 반경(미터). 양의 유한값만 받습니다.
//! - `ATTENDANCE_IDLE_WINDOWS` (4): 교사 화면 조회가 이 코드 창 수만큼 없으면 세션 자동 종료
//! - `ATTENDANCE_ALLOW_WITHOUT_LOCATION` (true): 학생 위치가 없을 때 반경 검사를 건너뛸지
//! - `ATTENDANCE_REQUIRE_CURRENT_NONCE` (false): 스캔한 nonce가 세션의 현재 nonce와 같아야 하는지

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// QR 출석 정책
///
/// 생성기(교사 측)와 체크인 검증(학생 측)이 같은 값을 공유합니다.
#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    /// 코드 유효 시간이자 회전 주기 (초)
    pub code_window_secs: u32,
    /// 출석 인원 폴링 주기
    pub poll_interval: Duration,
    /// 허용 반경 (미터)
    pub geofence_radius_m: f64,
    /// 학생 위치가 없으면 반경 검사를 건너뜀 (fail-open)
    pub allow_check_in_without_location: bool,
    /// 제출 시점에 nonce가 세션의 현재 nonce와 일치해야 함
    pub require_current_nonce: bool,
    /// 교사 화면 조회 없이 버티는 코드 창 수
    pub idle_windows: u32,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            code_window_secs: 15,
            poll_interval: Duration::from_secs(3),
            geofence_radius_m: 50.0,
            allow_check_in_without_location: true,
            require_current_nonce: false,
            idle_windows: 4,
        }
    }
}

impl AttendancePolicy {
    /// 환경변수에서 정책을 읽습니다. 값이 없거나 파싱에 실패하면 기본값을 씁니다.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            // 0초 창은 회전이 멈추지 않으므로 최소 1초
            code_window_secs: env_or("ATTENDANCE_CODE_WINDOW_SECS", defaults.code_window_secs)
                .max(1),
            poll_interval: Duration::from_secs(
                env_or("ATTENDANCE_POLL_INTERVAL_SECS", defaults.poll_interval.as_secs()).max(1),
            ),
            geofence_radius_m: env_positive("ATTENDANCE_GEOFENCE_RADIUS_M", defaults.geofence_radius_m),
            allow_check_in_without_location: env_or(
                "ATTENDANCE_ALLOW_WITHOUT_LOCATION",
                defaults.allow_check_in_without_location,
            ),
            require_current_nonce: env_or(
                "ATTENDANCE_REQUIRE_CURRENT_NONCE",
                defaults.require_current_nonce,
            ),
            idle_windows: env_or("ATTENDANCE_IDLE_WINDOWS", defaults.idle_windows).max(1),
        }
    }

    /// 교사 화면 조회가 없을 때 세션을 유지하는 최대 시간
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.code_window_secs) * u64::from(self.idle_windows))
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

/// 양의 유한한 실수만 받습니다. `NaN`, `inf`, 0 이하는 기본값으로 대체합니다.
fn env_positive(key: &str, default: f64) -> f64 {
    let value: f64 = env_or(key, default);
    if value.is_finite() && value > 0.0 {
        value
    } else {
        tracing::warn!("Ignoring {}={}, using {}", key, value, default);
        default
    }
}

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후,
/// 애플리케이션 전체에서 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 파일 경로 (예: "sqlite:data/edusphere.db")
    pub database_url: String,
    /// JWT 토큰 서명/검증에 사용하는 비밀키
    pub jwt_secret: String,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 3000)
    pub port: u16,
    pub attendance: AttendancePolicy,
    /// 최초 관리자 계정. 둘 다 있을 때만 시작 시 생성합니다.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있어 환경변수가 없어도 동작합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            attendance: AttendancePolicy::from_env(),
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        })
    }
}
