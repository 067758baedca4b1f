use crate::core::geo::{Point, TileCoord};
use serde::{Deserialize, Serialize};

/// A rectangle in world pixel space at one zoom level.
///
/// `min` is inclusive and `max` exclusive, so `width()` is exactly the number
/// of pixel columns the rectangle covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl PixelBounds {
    /// Creates bounds from individual coordinates
    pub fn from_coords(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates bounds from a pixel origin and a size
    pub fn from_origin_and_size(min_x: i64, min_y: i64, width: i64, height: i64) -> Self {
        Self::from_coords(min_x, min_y, min_x + width, min_y + height)
    }

    /// Rounds two projected corners (in any order) to whole pixels
    pub fn from_corners(a: Point, b: Point) -> Self {
        let a = a.round();
        let b = b.round();
        Self::from_coords(
            a.x.min(b.x) as i64,
            a.y.min(b.y) as i64,
            a.x.max(b.x) as i64,
            a.y.max(b.y) as i64,
        )
    }

    /// Gets the width of the bounds
    pub fn width(&self) -> i64 {
        self.max_x - self.min_x
    }

    /// Gets the height of the bounds
    pub fn height(&self) -> i64 {
        self.max_y - self.min_y
    }

    /// True when the rectangle covers no pixels
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Checks if the pixel at `(x, y)` lies inside the bounds
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// The inclusive tile-index range covering every pixel of the bounds.
    ///
    /// Returns `None` for degenerate bounds or a zero tile size.
    pub fn tile_range(&self, tile_size: u32) -> Option<TileRange> {
        if self.is_degenerate() || tile_size == 0 {
            return None;
        }
        let size = tile_size as i64;
        Some(TileRange {
            min_x: self.min_x.div_euclid(size),
            min_y: self.min_y.div_euclid(size),
            max_x: (self.max_x - 1).div_euclid(size),
            max_y: (self.max_y - 1).div_euclid(size),
        })
    }
}

/// Inclusive rectangle of tile indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl TileRange {
    pub fn columns(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    pub fn rows(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    pub fn len(&self) -> usize {
        (self.columns() * self.rows()).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, coord: &TileCoord) -> bool {
        coord.x >= self.min_x && coord.x <= self.max_x && coord.y >= self.min_y && coord.y <= self.max_y
    }

    /// Every tile in the range at zoom `z`, row by row
    pub fn tiles(&self, z: u8) -> Vec<TileCoord> {
        let mut tiles = Vec::with_capacity(self.len());
        for y in self.min_y..=self.max_y {
            for x in self.min_x..=self.max_x {
                tiles.push(TileCoord::new(x, y, z));
            }
        }
        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_creation() {
        let bounds = PixelBounds::from_coords(10, 20, 30, 60);
        assert_eq!(bounds.width(), 20);
        assert_eq!(bounds.height(), 40);
        assert!(!bounds.is_degenerate());
        assert!(bounds.contains(10, 20));
        assert!(!bounds.contains(30, 20));
    }

    #[test]
    fn test_from_corners_orders_and_rounds() {
        let bounds = PixelBounds::from_corners(Point::new(100.6, 20.2), Point::new(10.4, 80.5));
        assert_eq!(bounds, PixelBounds::from_coords(10, 20, 101, 81));
    }

    #[test]
    fn test_equal_corners_are_degenerate() {
        let p = Point::new(512.3, 300.7);
        let bounds = PixelBounds::from_corners(p, p);
        assert!(bounds.is_degenerate());
        assert!(bounds.tile_range(256).is_none());
    }

    #[test]
    fn test_aligned_tile_range() {
        let bounds = PixelBounds::from_origin_and_size(512, 1024, 512, 512);
        let range = bounds.tile_range(256).unwrap();
        assert_eq!(range.columns(), 2);
        assert_eq!(range.rows(), 2);
        assert_eq!(range.tiles(10).len(), 4);
    }

    #[test]
    fn test_unaligned_tile_range_covers_every_pixel() {
        let bounds = PixelBounds::from_coords(100, 250, 613, 260);
        let range = bounds.tile_range(256).unwrap();
        assert_eq!((range.min_x, range.max_x), (0, 2));
        assert_eq!((range.min_y, range.max_y), (0, 1));

        for (x, y) in [(100i64, 250i64), (612, 259), (256, 256), (511, 255)] {
            let tile = TileCoord::new(x.div_euclid(256), y.div_euclid(256), 3);
            assert!(range.contains(&tile));
        }
    }

    #[test]
    fn test_negative_pixels_floor_towards_negative_tiles() {
        let bounds = PixelBounds::from_coords(-10, 0, 10, 10);
        let range = bounds.tile_range(256).unwrap();
        assert_eq!((range.min_x, range.max_x), (-1, 0));
    }
}
