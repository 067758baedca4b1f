//! User-level entry points: analyze the selected map area, analyze an upload,
//! and follow up with recommendations or insights.

use crate::analysis::client::{AnalysisService, GenerativeAnalysisClient};
use crate::analysis::types::{
    InsightRequest, InsightTopic, Insights, SegmentationResult, SustainabilityReport,
    SustainabilityRequest,
};
use crate::capture::pipeline::CapturePipeline;
use crate::core::config::MapsightConfig;
use crate::core::geo::LatLngBounds;
use crate::dispatch::{BusyGuard, PresentationState, ResultDispatcher, UploadedFile};
use crate::map::MapWidget;
use crate::region::RegionSelector;
use crate::runtime::{self, TaskHandle};
use crate::tiles::{HttpTileFetcher, TileFetcher};
use crate::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Ties the region selector, capture pipeline and dispatcher to one map
pub struct AnalysisSession {
    selector: Mutex<RegionSelector>,
    pipeline: CapturePipeline,
    dispatcher: ResultDispatcher,
}

impl AnalysisSession {
    pub fn new(
        widget: Arc<dyn MapWidget>,
        fetcher: Arc<dyn TileFetcher>,
        service: Arc<dyn AnalysisService>,
        config: &MapsightConfig,
    ) -> Self {
        let selector = RegionSelector::attach(widget.as_ref(), config.region.clone());
        let pipeline = CapturePipeline::new(widget, fetcher, config.capture.clone())
            .with_tile_source(&config.tiles);
        let dispatcher = ResultDispatcher::new(service, Arc::new(PresentationState::new()));
        Self {
            selector: Mutex::new(selector),
            pipeline,
            dispatcher,
        }
    }

    /// Builds a session backed by the configured tile server and analysis endpoint
    pub fn from_config(widget: Arc<dyn MapWidget>, config: &MapsightConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(HttpTileFetcher::from_config(&config.tiles)?);
        let service = Arc::new(GenerativeAnalysisClient::new(config.analysis.clone())?);
        Ok(Self::new(widget, fetcher, service, config))
    }

    fn selector(&self) -> MutexGuard<'_, RegionSelector> {
        self.selector.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> &Arc<PresentationState> {
        self.dispatcher.state()
    }

    pub fn set_radius(&self, radius_m: f64) -> bool {
        self.selector().set_radius(radius_m)
    }

    pub fn radius(&self) -> f64 {
        self.selector().radius()
    }

    /// Current analysis bounds, after applying any pending viewport events
    pub fn bounds(&self) -> Option<LatLngBounds> {
        let mut selector = self.selector();
        selector.poll();
        selector.bounds().cloned()
    }

    fn begin(&self) -> Result<BusyGuard<'_>> {
        self.state().try_begin().map_err(|e| {
            self.state().record_error(&e);
            e
        })
    }

    pub fn can_analyze(&self) -> bool {
        self.bounds().is_some() && !self.state().is_busy()
    }

    /// Captures the selected area and sends it for segmentation
    pub async fn analyze_map_area(&self, cancel: &CancellationToken) -> Result<SegmentationResult> {
        let state = self.state();
        let bounds = match self.bounds() {
            Some(bounds) => bounds,
            None => {
                state.record_error(&Error::NoSelection);
                return Err(Error::NoSelection);
            }
        };
        let _busy = self.begin()?;
        state.clear();

        let image = match self.pipeline.capture(&bounds, cancel).await {
            Ok(image) => image,
            Err(e) => {
                state.record_error(&e);
                return Err(e);
            }
        };
        self.dispatcher.dispatch(image.into()).await
    }

    /// Sends a user-supplied image for segmentation
    pub async fn analyze_upload(&self, file: UploadedFile) -> Result<SegmentationResult> {
        let state = self.state();
        let _busy = self.begin()?;
        state.clear();
        self.dispatcher.dispatch(file.into()).await
    }

    /// Runs [`AnalysisSession::analyze_map_area`] in the background
    pub fn start_map_analysis(self: &Arc<Self>) -> TaskHandle<Result<SegmentationResult>> {
        let session = Arc::clone(self);
        runtime::spawn(move |cancel| async move { session.analyze_map_area(&cancel).await })
    }

    /// Sustainability request built from the latest segmentation and the current bounds
    pub fn sustainability_request(&self, population_density: f64) -> Option<SustainabilityRequest> {
        let segmentation = self.state().segmentation()?;
        Some(SustainabilityRequest::from_segmentation(
            self.bounds(),
            &segmentation,
            population_density,
        ))
    }

    pub async fn request_recommendations(&self, request: &SustainabilityRequest) -> Result<SustainabilityReport> {
        self.dispatcher.request_recommendations(request).await
    }

    /// Asks for insights about the selected area
    pub async fn request_insights(
        &self,
        topics: Vec<InsightTopic>,
        custom_topic: Option<String>,
    ) -> Result<Insights> {
        let bounds = match self.bounds() {
            Some(bounds) => bounds,
            None => {
                self.state().record_error(&Error::NoSelection);
                return Err(Error::NoSelection);
            }
        };
        let request = InsightRequest {
            bounds,
            topics,
            custom_topic,
        };
        self.dispatcher.request_insights(&request).await
    }
}
