use super::source::{TileSource, UrlTemplateSource};
use crate::core::bounds::PixelBounds;
use crate::core::config::TileSourceConfig;
use crate::core::geo::TileCoord;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use image::RgbaImage;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

/// Shared HTTP client with a custom User-Agent so that public tile servers
/// (e.g. OpenStreetMap) don't reject the request.
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("mapsight/", env!("CARGO_PKG_VERSION")))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .expect("failed to build reqwest async client")
});

/// A decoded tile and the grid index it was fetched for
#[derive(Debug, Clone)]
pub struct FetchedTile {
    pub coord: TileCoord,
    pub image: RgbaImage,
}

/// Retrieves one decoded tile image
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch_tile(&self, coord: TileCoord) -> Result<RgbaImage>;
}

/// Fetches tiles over HTTP(S) from a [`TileSource`]
pub struct HttpTileFetcher {
    client: reqwest::Client,
    source: Arc<dyn TileSource>,
    timeout: Duration,
}

impl HttpTileFetcher {
    pub fn new(source: Arc<dyn TileSource>) -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
            source,
            timeout: Duration::from_secs(10),
        }
    }

    /// Builds a fetcher with its own client carrying the configured user agent
    pub fn from_config(config: &TileSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            source: Arc::new(UrlTemplateSource::from_config(config)),
            timeout: config.request_timeout(),
        })
    }

    pub fn source(&self) -> &dyn TileSource {
        self.source.as_ref()
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch_tile(&self, coord: TileCoord) -> Result<RgbaImage> {
        if !coord.is_valid() {
            return Err(tile_error(coord, "row outside the tile grid"));
        }

        let url = self.source.url(coord);
        log::debug!("fetch tile {} from {}", coord, url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| tile_error(coord, e.to_string()))?;

        if !response.status().is_success() {
            return Err(tile_error(coord, format!("HTTP {}", response.status())));
        }

        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.starts_with("image/") {
                return Err(tile_error(
                    coord,
                    format!("unexpected content type {}", content_type),
                ));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| tile_error(coord, e.to_string()))?;
        decode_tile(coord, &bytes)
    }
}

/// Decodes raw tile bytes into RGBA
pub fn decode_tile(coord: TileCoord, bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| tile_error(coord, format!("decode failed: {}", e)))
}

fn tile_error(tile: TileCoord, reason: impl Into<String>) -> Error {
    Error::TileFetch {
        tile,
        reason: reason.into(),
    }
}

/// Fetches every tile covering `pixel_bounds` at `zoom`.
///
/// The requests are interleaved on the calling task and awaited as one
/// batch. The first failure aborts the batch: either every tile is returned
/// or none is.
pub async fn fetch_tiles(
    fetcher: &dyn TileFetcher,
    pixel_bounds: &PixelBounds,
    zoom: u8,
    tile_size: u32,
) -> Result<Vec<FetchedTile>> {
    let range = pixel_bounds
        .tile_range(tile_size)
        .ok_or(Error::DegenerateRegion {
            width: pixel_bounds.width(),
            height: pixel_bounds.height(),
        })?;
    let coords = range.tiles(zoom);
    log::debug!(
        "fetching {} tiles ({}x{}) at zoom {}",
        coords.len(),
        range.columns(),
        range.rows(),
        zoom
    );

    let requests = coords.into_iter().map(|coord| async move {
        match fetcher.fetch_tile(coord).await {
            Ok(image) => Ok(FetchedTile { coord, image }),
            Err(e) => {
                log::warn!("tile {} failed: {}", coord, e);
                Err(match e {
                    Error::TileFetch { .. } | Error::Cancelled => e,
                    other => tile_error(coord, other.to_string()),
                })
            }
        }
    });

    try_join_all(requests).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba};
    use std::io::Cursor;
    use std::sync::Mutex;

    struct SolidFetcher {
        calls: Mutex<Vec<TileCoord>>,
        fail: Option<TileCoord>,
    }

    #[async_trait]
    impl TileFetcher for SolidFetcher {
        async fn fetch_tile(&self, coord: TileCoord) -> Result<RgbaImage> {
            self.calls.lock().unwrap().push(coord);
            if Some(coord) == self.fail {
                return Err(Error::Encoding("boom".into()));
            }
            Ok(RgbaImage::from_pixel(256, 256, Rgba([1, 2, 3, 255])))
        }
    }

    #[tokio::test]
    async fn test_fetches_covering_grid() {
        let fetcher = SolidFetcher {
            calls: Mutex::new(Vec::new()),
            fail: None,
        };
        let bounds = PixelBounds::from_origin_and_size(256 * 10, 256 * 20, 512, 512);
        let tiles = fetch_tiles(&fetcher, &bounds, 10, 256).await.unwrap();

        assert_eq!(tiles.len(), 4);
        let calls = fetcher.calls.lock().unwrap();
        for coord in [(10, 20), (11, 20), (10, 21), (11, 21)] {
            assert!(calls.contains(&TileCoord::new(coord.0, coord.1, 10)));
        }
    }

    #[tokio::test]
    async fn test_foreign_errors_are_attributed_to_the_tile() {
        let failing = TileCoord::new(1, 0, 4);
        let fetcher = SolidFetcher {
            calls: Mutex::new(Vec::new()),
            fail: Some(failing),
        };
        let bounds = PixelBounds::from_coords(0, 0, 512, 256);
        let err = fetch_tiles(&fetcher, &bounds, 4, 256).await.unwrap_err();
        match err {
            Error::TileFetch { tile, .. } => assert_eq!(tile, failing),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_decode_png_tile() {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255])))
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        let tile = decode_tile(TileCoord::new(0, 0, 0), &bytes).unwrap();
        assert_eq!(tile.dimensions(), (4, 4));
    }

    #[test]
    fn test_decode_garbage_is_tile_error() {
        let err = decode_tile(TileCoord::new(2, 3, 4), b"<html>not found</html>").unwrap_err();
        assert!(matches!(err, Error::TileFetch { tile, .. } if tile == TileCoord::new(2, 3, 4)));
    }

    #[tokio::test]
    async fn test_out_of_grid_row_fails_before_request() {
        let fetcher = HttpTileFetcher::new(Arc::new(UrlTemplateSource::new(
            "http://127.0.0.1:9/{z}/{x}/{y}.png",
        )));
        let err = fetcher.fetch_tile(TileCoord::new(0, 8, 3)).await.unwrap_err();
        assert!(matches!(err, Error::TileFetch { .. }));
    }

    /// Answers exactly one HTTP request on a loopback port and returns a tile
    /// template pointing at it
    async fn serve_once(status: &'static str, content_type: &'static str, body: Vec<u8>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                content_type,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/{{z}}/{{x}}/{{y}}.png", addr)
    }

    fn fetcher_for(url_template: String) -> HttpTileFetcher {
        HttpTileFetcher::from_config(&TileSourceConfig {
            url_template,
            subdomains: Vec::new(),
            ..Default::default()
        })
        .unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(256, 256, Rgba([3, 4, 5, 255])))
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_error_status_is_tile_error() {
        let template = serve_once("404 Not Found", "text/plain", b"missing".to_vec()).await;
        let coord = TileCoord::new(1, 1, 2);
        match fetcher_for(template).fetch_tile(coord).await {
            Err(Error::TileFetch { tile, reason }) => {
                assert_eq!(tile, coord);
                assert!(reason.contains("404"), "{}", reason);
            }
            other => panic!("unexpected result {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[tokio::test]
    async fn test_non_image_content_type_is_tile_error() {
        let template = serve_once("200 OK", "text/html", png_bytes()).await;
        match fetcher_for(template).fetch_tile(TileCoord::new(0, 0, 1)).await {
            Err(Error::TileFetch { reason, .. }) => assert!(reason.contains("text/html"), "{}", reason),
            other => panic!("unexpected result {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[tokio::test]
    async fn test_image_response_is_decoded() {
        let template = serve_once("200 OK", "image/png", png_bytes()).await;
        let tile = fetcher_for(template).fetch_tile(TileCoord::new(0, 0, 1)).await.unwrap();
        assert_eq!(tile.dimensions(), (256, 256));
        assert_eq!(tile.get_pixel(10, 10), &Rgba([3, 4, 5, 255]));
    }
}
