//! # 거리 계산 (지오펜스)
//!
//! 두 좌표 사이의 대권 거리(great-circle distance)를 하버사인(haversine) 공식으로 계산합니다.
//! 결과는 미터 단위이며, GPS 오차 범위 안에서 충분히 정확합니다.

use crate::models::geo::GeoPoint;

/// 지구 반지름 (미터)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// 두 좌표 사이의 거리(미터)를 반환합니다.
///
/// 부수 효과가 없는 순수 함수이며 `distance_meters(a, b) == distance_meters(b, a)`,
/// `distance_meters(a, a) == 0.0`이 항상 성립합니다.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    // 반올림 오차로 h가 1을 살짝 넘으면 sqrt(1 - h)가 NaN이 됩니다
    let h = h.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// `point`가 `anchor`로부터 `radius_m` 이내인지 확인하고, 측정한 거리를 함께 돌려줍니다.
pub fn within_radius(anchor: GeoPoint, point: GeoPoint, radius_m: f64) -> (bool, f64) {
    let distance = distance_meters(anchor, point);
    (distance <= radius_m, distance)
}
