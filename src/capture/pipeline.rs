use super::project::project_bounds;
use super::resample::{resample, CapturedImage};
use super::stitch::stitch;
use crate::core::config::{CaptureConfig, TileSourceConfig};
use crate::core::constants::{DEFAULT_MAX_ZOOM, TILE_SIZE};
use crate::core::geo::LatLngBounds;
use crate::core::viewport::Viewport;
use crate::map::MapWidget;
use crate::runtime;
use crate::tiles::{fetch_tiles, TileFetcher};
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Turns analysis bounds into one image of what the map shows there.
///
/// Holds no state between captures; every canvas is created and dropped
/// inside a single call.
pub struct CapturePipeline {
    widget: Arc<dyn MapWidget>,
    fetcher: Arc<dyn TileFetcher>,
    config: CaptureConfig,
    tile_size: u32,
    max_zoom: u8,
}

impl CapturePipeline {
    pub fn new(widget: Arc<dyn MapWidget>, fetcher: Arc<dyn TileFetcher>, config: CaptureConfig) -> Self {
        Self {
            widget,
            fetcher,
            config,
            tile_size: TILE_SIZE,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }

    /// Uses the tile grid of `source`: its tile size, and its max zoom as a
    /// ceiling on the capture zoom
    pub fn with_tile_source(mut self, source: &TileSourceConfig) -> Self {
        self.tile_size = source.tile_size;
        self.max_zoom = source.max_zoom;
        self
    }

    pub fn widget(&self) -> &Arc<dyn MapWidget> {
        &self.widget
    }

    /// Fits the map to `bounds`, waits for it to settle, then captures the region
    /// at the zoom the map ended up on.
    pub async fn capture(&self, bounds: &LatLngBounds, cancel: &CancellationToken) -> Result<CapturedImage> {
        self.widget.fit_bounds(bounds);
        self.widget
            .wait_until_settled(self.config.settle_delay(), cancel)
            .await?;

        let viewport = self.widget.viewport_snapshot();
        self.capture_viewport(bounds, &viewport, cancel).await
    }

    /// Captures `bounds` as rendered in `viewport`, without moving the map.
    ///
    /// Tiles are requested on the pipeline's tile grid, at the viewport zoom
    /// capped to the source's max zoom.
    pub async fn capture_viewport(
        &self,
        bounds: &LatLngBounds,
        viewport: &Viewport,
        cancel: &CancellationToken,
    ) -> Result<CapturedImage> {
        let started = Instant::now();
        let zoom = viewport.zoom.min(self.max_zoom);
        let tile_size = self.tile_size;

        let pixel_bounds = project_bounds(bounds, zoom, tile_size)?;
        log::debug!(
            "capture region {}x{}px at zoom {}",
            pixel_bounds.width(),
            pixel_bounds.height(),
            zoom
        );

        let tiles = runtime::cancellable(
            fetch_tiles(self.fetcher.as_ref(), &pixel_bounds, zoom, tile_size),
            cancel,
        )
        .await?;
        let tile_count = tiles.len();

        let canvas = stitch(&tiles, &pixel_bounds, tile_size)?;
        drop(tiles);

        if cancel.is_cancelled() {
            return Err(crate::Error::Cancelled);
        }

        let mut image = resample(canvas, viewport.pixel_size())?;
        image.filename = self.config.output_filename.clone();

        log::info!(
            "captured {} ({}x{}, {} tiles, {} bytes) in {:?}",
            image.filename,
            image.width,
            image.height,
            tile_count,
            image.bytes.len(),
            started.elapsed()
        );
        Ok(image)
    }
}
