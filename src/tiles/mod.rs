pub mod fetcher;
pub mod source;

// Re-exports for convenience
pub use fetcher::{fetch_tiles, FetchedTile, HttpTileFetcher, TileFetcher};
pub use source::{TileSource, UrlTemplateSource};
