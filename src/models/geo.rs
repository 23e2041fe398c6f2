//! # 위치(Geolocation) 모델
//!
//! 교사 단말의 기준 위치(anchor)와 학생 단말이 제출한 위치를 표현합니다.
//! 브라우저 Geolocation API가 돌려주는 값과 같은 구조입니다.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 위도/경도 한 쌍 (도 단위)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// 위도 [-90, 90], 경도 [-180, 180] 범위 안의 유한한 값인지 확인합니다.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// 위치 조회 실패 분류 (브라우저 `GeolocationPositionError`의 표준 코드 1/2/3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum GeolocationError {
    #[error("Location permission was denied. Allow location access in your browser settings and try again.")]
    PermissionDenied,
    #[error("Your position is unavailable. Move closer to a window or enable location services, then retry.")]
    PositionUnavailable,
    #[error("Locating your device timed out. Please retry.")]
    Timeout,
}

/// 클라이언트가 보내는 위치 조회 결과.
///
/// 위치를 얻었으면 `position`, 실패했으면 `error`에 분류 코드가 담깁니다.
/// 둘 다 비어 있으면 "위치 정보 없음"으로 처리합니다.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationReport {
    pub position: Option<GeoPoint>,
    pub error: Option<GeolocationError>,
}

impl LocationReport {
    #[cfg(test)]
    pub fn fix(point: GeoPoint) -> Self {
        Self {
            position: Some(point),
            error: None,
        }
    }

    #[cfg(test)]
    pub fn failed(error: GeolocationError) -> Self {
        Self {
            position: None,
            error: Some(error),
        }
    }

    /// 유효한 좌표만 위치로 인정합니다. 범위를 벗어난 좌표는 위치 없음과 같습니다.
    pub fn position(&self) -> Option<GeoPoint> {
        self.position.filter(GeoPoint::is_valid)
    }

    /// 교사 측 위치 획득 결과. 위치가 없으면 실패 분류를 돌려줍니다.
    pub fn into_result(self) -> Result<GeoPoint, GeolocationError> {
        match (self.position(), self.error) {
            (Some(point), _) => Ok(point),
            (None, Some(err)) => Err(err),
            (None, None) => Err(GeolocationError::PositionUnavailable),
        }
    }
}
