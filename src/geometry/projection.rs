/// Spherical Web Mercator (EPSG:3857) to and from WGS84 (EPSG:4326)
///
/// The sphere formulas used by every slippy-map stack:
/// - x = R * lon
/// - y = R * ln(tan(pi/4 + lat/2))
///
/// Pure functions with no owned state; the proj crate would drag in libproj
/// for two closed-form expressions.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude at which Web Mercator y reaches the square's edge
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Half the width of the projected world in metres
pub const HALF_WORLD_M: f64 = std::f64::consts::PI * EARTH_RADIUS_M;

/// Project a geographic (lon, lat) pair in degrees to Web Mercator metres.
///
/// Latitudes beyond [`MAX_LATITUDE`] are clamped, since the poles map to infinity.
pub fn to_web_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Unproject Web Mercator metres to a geographic (lon, lat) pair in degrees.
pub fn to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

/// Approximate ground distance in metres between two Web Mercator points.
///
/// Mercator stretches lengths by 1/cos(lat); scaling the planar distance back by
/// the cosine of the mean latitude is accurate at city scale.
pub fn ground_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (_, lat_a) = to_wgs84(a.0, a.1);
    let (_, lat_b) = to_wgs84(b.0, b.1);
    let mean_lat = (lat_a + lat_b) / 2.0;

    let planar = (a.0 - b.0).hypot(a.1 - b.1);
    planar * mean_lat.to_radians().cos()
}
