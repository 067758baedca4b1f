//! Configuration for the tile source, region selector, capture pipeline and
//! analysis service.
//!
//! Every section has working defaults, so an empty JSON object is a valid
//! configuration. The analysis API key is baked in at build time from the
//! `MAPSIGHT_API_KEY` environment variable and is never serialized.

use crate::core::constants::{
    CAPTURE_FILENAME, DEFAULT_MAX_ZOOM, DEFAULT_RADIUS_METERS, MAX_RADIUS_METERS,
    MAX_SUPPORTED_ZOOM, MIN_RADIUS_METERS, SETTLE_DELAY, TILE_SIZE,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapsightConfig {
    pub tiles: TileSourceConfig,
    pub region: RegionConfig,
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
}

impl MapsightConfig {
    /// Parses a JSON configuration document and validates it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.tiles.validate()?;
        self.region.validate()?;
        Ok(())
    }
}

/// Where base-map tiles come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSourceConfig {
    /// URL with `{z}`, `{x}`, `{y}` and optionally `{s}` placeholders
    pub url_template: String,
    /// Values substituted for `{s}`, rotated per tile
    pub subdomains: Vec<String>,
    pub tile_size: u32,
    pub max_zoom: u8,
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl TileSourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !self.url_template.contains(placeholder) {
                return Err(Error::Config(format!(
                    "tile URL template is missing {}",
                    placeholder
                )));
            }
        }
        if self.url_template.contains("{s}") && self.subdomains.is_empty() {
            return Err(Error::Config(
                "tile URL template uses {s} but no subdomains are configured".into(),
            ));
        }
        if self.tile_size == 0 {
            return Err(Error::Config("tile size must be positive".into()));
        }
        if self.max_zoom > MAX_SUPPORTED_ZOOM {
            return Err(Error::Config(format!(
                "max zoom {} exceeds {}",
                self.max_zoom, MAX_SUPPORTED_ZOOM
            )));
        }
        Ok(())
    }
}

impl Default for TileSourceConfig {
    fn default() -> Self {
        Self {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            subdomains: vec!["a".into(), "b".into(), "c".into()],
            tile_size: TILE_SIZE,
            max_zoom: DEFAULT_MAX_ZOOM,
            request_timeout_ms: 10_000,
            user_agent: concat!("mapsight/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Radius slider limits, in meters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub min_radius_m: f64,
    pub max_radius_m: f64,
    pub default_radius_m: f64,
}

impl RegionConfig {
    pub fn clamp_radius(&self, radius_m: f64) -> f64 {
        if radius_m.is_nan() {
            return self.min_radius_m;
        }
        radius_m.clamp(self.min_radius_m, self.max_radius_m)
    }

    fn validate(&self) -> Result<()> {
        if self.min_radius_m < 0.0 || self.min_radius_m > self.max_radius_m {
            return Err(Error::Config(format!(
                "invalid radius range {}..={}",
                self.min_radius_m, self.max_radius_m
            )));
        }
        Ok(())
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_radius_m: MIN_RADIUS_METERS,
            max_radius_m: MAX_RADIUS_METERS,
            default_radius_m: DEFAULT_RADIUS_METERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Fixed wait after fit-bounds before the viewport is read
    pub settle_delay_ms: u64,
    pub output_filename: String,
}

impl CaptureConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: SETTLE_DELAY.as_millis() as u64,
            output_filename: CAPTURE_FILENAME.to_string(),
        }
    }
}

/// Generative analysis endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub endpoint: String,
    /// Model used for the text contracts
    pub model: String,
    /// Model able to return images, used for segmentation
    pub image_model: String,
    pub request_timeout_ms: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl AnalysisConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            request_timeout_ms: 120_000,
            api_key: option_env!("MAPSIGHT_API_KEY").map(str::to_string),
        }
    }
}
