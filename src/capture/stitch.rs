use crate::core::bounds::PixelBounds;
use crate::tiles::FetchedTile;
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::borrow::Cow;

/// Intermediate raster covering exactly one [`PixelBounds`] at native tile resolution
#[derive(Debug, Clone)]
pub struct StitchCanvas {
    pub image: RgbaImage,
    pub pixel_bounds: PixelBounds,
}

impl StitchCanvas {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Composites `tiles` into a canvas sized to `pixel_bounds`.
///
/// Each tile is drawn at `index * tile_size - pixel_bounds.min`; parts that
/// fall outside the canvas are clipped. Tiles are drawn in grid order, so the
/// result does not depend on the order they arrived in.
pub fn stitch(tiles: &[FetchedTile], pixel_bounds: &PixelBounds, tile_size: u32) -> Result<StitchCanvas> {
    if pixel_bounds.is_degenerate() {
        return Err(Error::DegenerateRegion {
            width: pixel_bounds.width(),
            height: pixel_bounds.height(),
        });
    }
    let width = u32::try_from(pixel_bounds.width())
        .map_err(|_| Error::Encoding(format!("canvas width {} too large", pixel_bounds.width())))?;
    let height = u32::try_from(pixel_bounds.height())
        .map_err(|_| Error::Encoding(format!("canvas height {} too large", pixel_bounds.height())))?;

    let mut canvas = RgbaImage::new(width, height);

    let mut ordered: Vec<&FetchedTile> = tiles.iter().collect();
    ordered.sort_by_key(|tile| (tile.coord.z, tile.coord.y, tile.coord.x));

    let size = tile_size as i64;
    for tile in ordered {
        let image: Cow<'_, RgbaImage> = if tile.image.dimensions() == (tile_size, tile_size) {
            Cow::Borrowed(&tile.image)
        } else {
            log::debug!(
                "rescaling tile {} from {:?} to {}px",
                tile.coord,
                tile.image.dimensions(),
                tile_size
            );
            Cow::Owned(imageops::resize(&tile.image, tile_size, tile_size, FilterType::Triangle))
        };

        let offset_x = tile.coord.x * size - pixel_bounds.min_x;
        let offset_y = tile.coord.y * size - pixel_bounds.min_y;
        imageops::replace(&mut canvas, &*image, offset_x, offset_y);
    }

    Ok(StitchCanvas {
        image: canvas,
        pixel_bounds: *pixel_bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::TileCoord;
    use image::Rgba;

    fn tile(x: i64, y: i64, color: [u8; 4]) -> FetchedTile {
        FetchedTile {
            coord: TileCoord::new(x, y, 5),
            image: RgbaImage::from_pixel(256, 256, Rgba(color)),
        }
    }

    #[test]
    fn test_canvas_matches_pixel_bounds() {
        let bounds = PixelBounds::from_coords(100, 200, 700, 500);
        let canvas = stitch(&[], &bounds, 256).unwrap();
        assert_eq!(canvas.dimensions(), (600, 300));
    }

    #[test]
    fn test_tiles_land_at_their_offsets_and_clip() {
        // Covers tiles x 0..=1, y 0..=0 but starts 100px into tile 0
        let bounds = PixelBounds::from_coords(100, 10, 400, 60);
        let tiles = vec![tile(0, 0, [255, 0, 0, 255]), tile(1, 0, [0, 0, 255, 255])];
        let canvas = stitch(&tiles, &bounds, 256).unwrap();

        assert_eq!(canvas.dimensions(), (300, 50));
        // world x 255 is the last red column, at canvas x 155
        assert_eq!(canvas.image.get_pixel(155, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.image.get_pixel(156, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(canvas.image.get_pixel(299, 49), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_any_order_gives_identical_bytes() {
        let bounds = PixelBounds::from_coords(30, 40, 700, 600);
        let tiles = vec![
            tile(0, 0, [10, 20, 30, 255]),
            tile(1, 0, [40, 50, 60, 255]),
            tile(2, 0, [70, 80, 90, 255]),
            tile(0, 1, [100, 110, 120, 255]),
            tile(1, 1, [130, 140, 150, 255]),
            tile(2, 1, [160, 170, 180, 255]),
            tile(0, 2, [190, 200, 210, 255]),
            tile(1, 2, [220, 230, 240, 255]),
            tile(2, 2, [250, 5, 15, 255]),
        ];
        let reference = stitch(&tiles, &bounds, 256).unwrap();

        let mut reversed = tiles.clone();
        reversed.reverse();
        let mut rotated = tiles.clone();
        rotated.rotate_left(4);

        for permutation in [reversed, rotated] {
            let canvas = stitch(&permutation, &bounds, 256).unwrap();
            assert_eq!(canvas.image.as_raw(), reference.image.as_raw());
        }
    }

    #[test]
    fn test_retina_tiles_are_rescaled() {
        let bounds = PixelBounds::from_coords(0, 0, 256, 256);
        let tiles = vec![FetchedTile {
            coord: TileCoord::new(0, 0, 1),
            image: RgbaImage::from_pixel(512, 512, Rgba([7, 7, 7, 255])),
        }];
        let canvas = stitch(&tiles, &bounds, 256).unwrap();
        assert_eq!(canvas.image.get_pixel(255, 255), &Rgba([7, 7, 7, 255]));
    }
}
