use crate::core::constants::{EARTH_RADIUS, MAX_LATITUDE};
use geo::{HaversineDestination, HaversineDistance};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// Great-circle distance to another coordinate, in meters
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        self.to_geo().haversine_distance(&other.to_geo())
    }

    /// Point reached by travelling `distance` meters along `bearing` degrees
    /// (clockwise from north) on a great circle.
    pub fn destination(&self, bearing: f64, distance: f64) -> LatLng {
        let point = self.to_geo().haversine_destination(bearing, distance);
        LatLng::new(point.y(), point.x())
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to the range Web Mercator can represent
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    fn to_geo(self) -> geo::Point<f64> {
        geo::Point::new(self.lng, self.lat)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn round(&self) -> Point {
        Point::new(self.x.round(), self.y.round())
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a bounding box of geographical coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// Gets the span of the bounds
    pub fn span(&self) -> LatLng {
        LatLng::new(
            self.north_east.lat - self.south_west.lat,
            self.north_east.lng - self.south_west.lng,
        )
    }

    pub fn north_west(&self) -> LatLng {
        LatLng::new(self.north_east.lat, self.south_west.lng)
    }

    pub fn south_east(&self) -> LatLng {
        LatLng::new(self.south_west.lat, self.north_east.lng)
    }

    pub fn south(&self) -> f64 {
        self.south_west.lat
    }

    pub fn west(&self) -> f64 {
        self.south_west.lng
    }

    pub fn north(&self) -> f64 {
        self.north_east.lat
    }

    pub fn east(&self) -> f64 {
        self.north_east.lng
    }
}

/// Projects a LatLng to world pixel coordinates at the given zoom level.
///
/// This is the spherical Web Mercator projection (EPSG:3857) used by slippy
/// map tile sources, so the result lines up with the rendered tile grid:
/// pixel `(0, 0)` is the north-west corner of tile `0/0/0`.
pub fn project(lat_lng: &LatLng, zoom: f64, tile_size: u32) -> Point {
    let scale = tile_size as f64 * 2_f64.powf(zoom);
    let lat = LatLng::clamp_lat(lat_lng.lat);

    let x = lat_lng.lng.to_radians() * EARTH_RADIUS;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;

    let circumference = 2.0 * PI * EARTH_RADIUS;
    Point::new(
        (x + PI * EARTH_RADIUS) / circumference * scale,
        (-y + PI * EARTH_RADIUS) / circumference * scale,
    )
}

/// Inverse of [`project`]
pub fn unproject(pixel: &Point, zoom: f64, tile_size: u32) -> LatLng {
    let scale = tile_size as f64 * 2_f64.powf(zoom);
    let circumference = 2.0 * PI * EARTH_RADIUS;

    let x = pixel.x / scale * circumference - PI * EARTH_RADIUS;
    let y = PI * EARTH_RADIUS - pixel.y / scale * circumference;

    let lng = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    LatLng::new(lat, lng)
}

/// A tile-grid index at a given zoom.
///
/// `x` and `y` are signed so that indices derived from pixel bounds that
/// cross the antimeridian keep their on-screen placement; [`TileCoord::wrapped`]
/// yields the index a tile server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i64,
    pub y: i64,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: i64, y: i64, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Number of tiles along one axis at this zoom, saturating at `i64::MAX`
    pub fn grid_size(&self) -> i64 {
        if self.z >= 63 {
            i64::MAX
        } else {
            1_i64 << self.z
        }
    }

    /// Checks if the tile row exists at this zoom
    pub fn is_valid(&self) -> bool {
        self.y >= 0 && self.y < self.grid_size()
    }

    /// The same tile with `x` wrapped into `[0, 2^z)`
    pub fn wrapped(&self) -> TileCoord {
        TileCoord::new(self.x.rem_euclid(self.grid_size()), self.y, self.z)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_creation() {
        let coord = LatLng::new(40.7128, -74.0060);
        assert_eq!(coord.lat, 40.7128);
        assert_eq!(coord.lng, -74.0060);
        assert!(coord.is_valid());
        assert!(!LatLng::new(91.0, 0.0).is_valid());
    }

    #[test]
    fn test_lat_lng_distance() {
        let nyc = LatLng::new(40.7128, -74.0060);
        let la = LatLng::new(34.0522, -118.2437);
        let distance = nyc.distance_to(&la);

        // Distance should be approximately 3936 km
        assert!((distance - 3_936_000.0).abs() < 15_000.0);
    }

    #[test]
    fn test_destination_round_trip() {
        let origin = LatLng::new(48.8566, 2.3522);
        let north = origin.destination(0.0, 1000.0);
        assert!(north.lat > origin.lat);
        assert!((north.lng - origin.lng).abs() < 1e-9);
        assert!((origin.distance_to(&north) - 1000.0).abs() < 0.5);
    }

    #[test]
    fn test_projection_matches_tile_grid() {
        // Zoom 0: the whole world is one 256px tile
        let origin = project(&LatLng::new(0.0, 0.0), 0.0, 256);
        assert!((origin.x - 128.0).abs() < 1e-9);
        assert!((origin.y - 128.0).abs() < 1e-9);

        let nw = project(&LatLng::new(MAX_LATITUDE, -180.0), 0.0, 256);
        assert!(nw.x.abs() < 1e-9);
        assert!(nw.y.abs() < 1e-6);
    }

    #[test]
    fn test_project_unproject_round_trip() {
        let coord = LatLng::new(37.7749, -122.4194);
        let pixel = project(&coord, 12.0, 256);
        let back = unproject(&pixel, 12.0, 256);
        assert!((back.lat - coord.lat).abs() < 1e-9);
        assert!((back.lng - coord.lng).abs() < 1e-9);
    }

    #[test]
    fn test_tile_wrapping() {
        let tile = TileCoord::new(-1, 3, 2);
        assert_eq!(tile.wrapped(), TileCoord::new(3, 3, 2));
        assert!(tile.is_valid());
        assert!(!TileCoord::new(0, 4, 2).is_valid());
        assert_eq!(tile.to_string(), "2/-1/3");
    }

    #[test]
    fn test_grid_size_saturates_at_extreme_zoom() {
        assert_eq!(TileCoord::new(0, 0, 30).grid_size(), 1 << 30);
        let huge = TileCoord::new(-1, 0, u8::MAX);
        assert_eq!(huge.grid_size(), i64::MAX);
        assert!(huge.is_valid());
        assert_eq!(huge.wrapped().x, i64::MAX - 1);
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = LatLngBounds::from_coords(40.0, -75.0, 41.0, -73.0);
        assert!(bounds.contains(&LatLng::new(40.5, -74.0)));
        assert!(!bounds.contains(&LatLng::new(42.0, -74.0)));
        assert_eq!(bounds.north_west(), LatLng::new(41.0, -75.0));
        assert_eq!(bounds.south_east(), LatLng::new(40.0, -73.0));
    }
}
