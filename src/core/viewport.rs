use crate::core::constants::{DEFAULT_MAX_ZOOM, MAX_LATITUDE, MAX_SUPPORTED_ZOOM, TILE_SIZE};
use crate::core::geo::{self, LatLng, LatLngBounds, Point};
use serde::{Deserialize, Serialize};

/// Read-only snapshot of the map's current view: center, zoom, and screen dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current (integer) zoom level
    pub zoom: u8,
    /// Width of the viewport in screen pixels
    pub width: u32,
    /// Height of the viewport in screen pixels
    pub height: u32,
    /// The minimum allowed zoom level
    pub min_zoom: u8,
    /// The maximum allowed zoom level
    pub max_zoom: u8,
    /// Tile size of the rendered base layer
    pub tile_size: u32,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(center: LatLng, zoom: u8, width: u32, height: u32) -> Self {
        Self {
            center: Self::clamp_center(center),
            zoom: zoom.min(DEFAULT_MAX_ZOOM),
            width,
            height,
            min_zoom: 0,
            max_zoom: DEFAULT_MAX_ZOOM,
            tile_size: TILE_SIZE,
        }
    }

    /// Sets the zoom limits, capping the maximum at [`MAX_SUPPORTED_ZOOM`]
    pub fn with_zoom_limits(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        let max_zoom = max_zoom.min(MAX_SUPPORTED_ZOOM);
        self.min_zoom = min_zoom.min(max_zoom);
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(self.min_zoom, self.max_zoom);
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Viewport size in pixels as `(width, height)`
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Projects a LatLng to world pixel coordinates at `zoom` (or the current zoom)
    pub fn project(&self, lat_lng: &LatLng, zoom: Option<u8>) -> Point {
        geo::project(lat_lng, zoom.unwrap_or(self.zoom) as f64, self.tile_size)
    }

    /// Unprojects world pixel coordinates back to LatLng
    pub fn unproject(&self, pixel: &Point, zoom: Option<u8>) -> LatLng {
        geo::unproject(pixel, zoom.unwrap_or(self.zoom) as f64, self.tile_size)
    }

    /// Converts a geographical coordinate to container pixel coordinates
    pub fn lat_lng_to_container_point(&self, lat_lng: &LatLng) -> Point {
        let origin = self.top_left_world_pixel();
        self.project(lat_lng, None).subtract(&origin)
    }

    /// Converts container pixel coordinates back to geographical coordinates
    pub fn container_point_to_lat_lng(&self, point: &Point) -> LatLng {
        let world = point.add(&self.top_left_world_pixel());
        self.unproject(&world, None)
    }

    fn top_left_world_pixel(&self) -> Point {
        let half = Point::new(self.width as f64 / 2.0, self.height as f64 / 2.0);
        self.project(&self.center, None).subtract(&half)
    }

    /// Gets the current viewport bounds in geographical coordinates
    pub fn bounds(&self) -> LatLngBounds {
        let nw = self.container_point_to_lat_lng(&Point::new(0.0, 0.0));
        let se = self.container_point_to_lat_lng(&Point::new(self.width as f64, self.height as f64));
        LatLngBounds::new(LatLng::new(se.lat, nw.lng), LatLng::new(nw.lat, se.lng))
    }

    /// Highest zoom at which `bounds` fits inside the viewport minus `padding`
    /// on every side. Falls back to `min_zoom` when nothing fits.
    pub fn bounds_zoom(&self, bounds: &LatLngBounds, padding: f64) -> u8 {
        let available_x = (self.width as f64 - 2.0 * padding).max(1.0);
        let available_y = (self.height as f64 - 2.0 * padding).max(1.0);

        let mut best_zoom = self.min_zoom;
        for zoom in self.min_zoom..=self.max_zoom {
            let nw = self.project(&bounds.north_west(), Some(zoom));
            let se = self.project(&bounds.south_east(), Some(zoom));

            if (se.x - nw.x).abs() <= available_x && (se.y - nw.y).abs() <= available_y {
                best_zoom = zoom;
            } else {
                break;
            }
        }
        best_zoom
    }

    /// Returns the viewport centred on `bounds` at the highest zoom that fits it
    pub fn fitted_to(&self, bounds: &LatLngBounds, padding: f64) -> Viewport {
        let mut fitted = self.clone();
        fitted.center = Self::clamp_center(bounds.center());
        fitted.zoom = self.bounds_zoom(bounds, padding);
        fitted
    }

    fn clamp_center(center: LatLng) -> LatLng {
        LatLng::new(
            center.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE),
            LatLng::wrap_lng(center.lng),
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::new(0.0, 0.0), 0, 800, 600)
    }
}
