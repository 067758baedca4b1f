//! Core constants shared by the region selector and the capture pipeline.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

use std::time::Duration;

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Latitude limit of the Web Mercator projection.
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// Equatorial radius used by the Web Mercator projection (EPSG:3857).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Highest zoom level served by common public tile sources.
pub const DEFAULT_MAX_ZOOM: u8 = 19;

/// Zoom ceiling; tile indices at this zoom still fit comfortably in `i64`.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

/// Radius slider range, in meters.
pub const MIN_RADIUS_METERS: f64 = 0.0;
pub const MAX_RADIUS_METERS: f64 = 2000.0;
pub const DEFAULT_RADIUS_METERS: f64 = 500.0;

/// How long to wait for the fit-bounds animation before projecting.
/// A heuristic: the map does not signal when its animation ends.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Padding, in pixels, kept around the region when fitting it to the viewport.
pub const FIT_BOUNDS_PADDING: f64 = 20.0;

/// Name and MIME type of the captured map image.
pub const CAPTURE_FILENAME: &str = "map-view.png";
pub const CAPTURE_MIME_TYPE: &str = "image/png";
