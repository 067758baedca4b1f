//! # mapsight
//!
//! Region capture and AI analysis dispatch for interactive GIS front ends.
//!
//! The crate tracks a map viewport and a user-chosen radius, derives the
//! region of interest, reconstructs a single raster of that region from the
//! tiled base map, and hands the image (or a user upload) to a generative
//! analysis service for land-cover segmentation, sustainability scoring and
//! contextual insights.

pub mod analysis;
pub mod capture;
pub mod core;
pub mod dispatch;
pub mod map;
pub mod prelude;
pub mod region;
pub mod runtime;
pub mod session;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::PixelBounds,
    config::MapsightConfig,
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    viewport::Viewport,
};

pub use analysis::{
    client::{AnalysisService, GenerativeAnalysisClient},
    types::{
        InsightRequest, InsightTopic, Insights, LandCoverBreakdown, LandCoverCategory, SegmentationResult,
        SustainabilityReport, SustainabilityRequest,
    },
};

pub use capture::{
    pipeline::CapturePipeline, resample::CapturedImage, stitch::StitchCanvas,
};

pub use dispatch::{AnalysisInput, ImageArtifact, PresentationState, ResultDispatcher, UploadedFile};

pub use map::{HeadlessMap, MapWidget, ViewportEvent, ViewportSubscription};

pub use region::{compute_bounds, RegionSelector};

pub use session::AnalysisSession;

pub use tiles::{
    fetcher::{FetchedTile, HttpTileFetcher, TileFetcher},
    source::{TileSource, UrlTemplateSource},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// The three request/response contracts offered by the analysis service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisContract {
    Segmentation,
    Sustainability,
    Insights,
}

impl std::fmt::Display for AnalysisContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Segmentation => "segmentation",
            Self::Sustainability => "sustainability report",
            Self::Insights => "contextual insights",
        };
        f.write_str(name)
    }
}

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Region projects to a degenerate pixel area ({width}x{height})")]
    DegenerateRegion { width: i64, height: i64 },

    #[error("Failed to fetch tile {}/{}/{}: {reason}", tile.z, tile.x, tile.y)]
    TileFetch { tile: TileCoord, reason: String },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Invalid {contract} response: {reason}")]
    AiResponse {
        contract: AnalysisContract,
        reason: String,
    },

    #[error("No region selected")]
    NoSelection,

    #[error("A capture is already in progress")]
    CaptureInProgress,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

impl Error {
    pub(crate) fn ai(contract: AnalysisContract, reason: impl Into<String>) -> Self {
        Self::AiResponse {
            contract,
            reason: reason.into(),
        }
    }

    /// Short message suitable for showing to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DegenerateRegion { .. } => "Cannot analyze this area.",
            Self::TileFetch { .. } | Self::Encoding(_) => "Could not capture map view.",
            Self::AiResponse { contract, .. } => contract_failure_message(*contract),
            Self::NoSelection => "Select an area on the map first.",
            Self::CaptureInProgress => "An analysis is already running.",
            Self::Cancelled => "Analysis cancelled.",
            Self::Network(_) | Self::Io(_) | Self::Serialization(_) => "Something went wrong. Please try again.",
            Self::Config(_) | Self::InvalidCoordinates(_) => "Invalid input.",
        }
    }
}

pub(crate) fn contract_failure_message(contract: AnalysisContract) -> &'static str {
    match contract {
        AnalysisContract::Segmentation => "Failed to analyze image.",
        AnalysisContract::Sustainability => "Failed to get recommendations.",
        AnalysisContract::Insights => "Failed to get insights.",
    }
}

/// Initialise `env_logger` from `RUST_LOG`. Safe to call more than once.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}
