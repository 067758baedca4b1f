//! Prelude module for common mapsight types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use mapsight::prelude::*;`

pub use crate::core::{
    bounds::{PixelBounds, TileRange},
    config::{AnalysisConfig, CaptureConfig, MapsightConfig, RegionConfig, TileSourceConfig},
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    viewport::Viewport,
};

pub use crate::analysis::{
    AnalysisService, GenerativeAnalysisClient, ImageArtifact, InsightRequest, InsightTopic,
    Insights, LandCoverBreakdown, LandCoverCategory, SegmentationResult, SustainabilityReport,
    SustainabilityRequest,
};

pub use crate::capture::{CapturePipeline, CapturedImage, StitchCanvas};

pub use crate::dispatch::{AnalysisInput, PresentationState, ResultDispatcher, UploadedFile};

pub use crate::map::{HeadlessMap, MapWidget, ViewportEvent, ViewportSubscription};

pub use crate::region::{compute_bounds, RegionSelector};

pub use crate::runtime::{spawn, AsyncHandle, TaskHandle};

pub use crate::session::AnalysisSession;

pub use crate::tiles::{FetchedTile, HttpTileFetcher, TileFetcher, TileSource, UrlTemplateSource};

pub use crate::{AnalysisContract, Error, Result};

pub use tokio_util::sync::CancellationToken;

// Common std types
pub use fxhash::FxHashMap as HashMap;
pub use std::future::Future;
pub use std::sync::Arc;
pub use std::time::Duration;
