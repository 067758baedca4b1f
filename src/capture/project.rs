use crate::core::bounds::PixelBounds;
use crate::core::geo::{self, LatLngBounds};
use crate::{Error, Result};

/// Projects the north-west and south-east corners of `bounds` to world pixels
/// at `zoom` and rounds them to whole pixels.
///
/// Fails with [`Error::DegenerateRegion`] when the rounded rectangle has no
/// area; callers rely on this happening before any tile is requested.
pub fn project_bounds(bounds: &LatLngBounds, zoom: u8, tile_size: u32) -> Result<PixelBounds> {
    let (south_west, north_east) = (bounds.south_west, bounds.north_east);
    let finite = [south_west.lat, south_west.lng, north_east.lat, north_east.lng]
        .iter()
        .all(|v| v.is_finite());
    // Longitudes may run past ±180 near the antimeridian; tile x wraps later
    if !finite
        || !(-90.0..=90.0).contains(&south_west.lat)
        || !(-90.0..=90.0).contains(&north_east.lat)
        || north_east.lng < south_west.lng
    {
        return Err(Error::InvalidCoordinates(format!("{:?}", bounds)));
    }

    let nw = geo::project(&bounds.north_west(), zoom as f64, tile_size);
    let se = geo::project(&bounds.south_east(), zoom as f64, tile_size);
    let pixel_bounds = PixelBounds::from_corners(nw, se);

    if pixel_bounds.is_degenerate() {
        return Err(Error::DegenerateRegion {
            width: pixel_bounds.width(),
            height: pixel_bounds.height(),
        });
    }
    Ok(pixel_bounds)
}
