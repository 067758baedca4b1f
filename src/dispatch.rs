//! Hands captured or uploaded imagery to the analysis service and keeps the
//! presentation state the UI renders from.

use crate::analysis::client::AnalysisService;
use crate::analysis::types::{
    InsightRequest, Insights, SegmentationResult, SustainabilityReport, SustainabilityRequest,
};
use crate::capture::resample::CapturedImage;
use crate::{Error, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub use crate::analysis::types::ImageArtifact;

/// An image file chosen by the user instead of a map capture
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads an image from disk, taking the MIME type from its extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let mime_type = mime_type_for_extension(extension).ok_or_else(|| {
            Error::Config(format!("unsupported image type: {}", path.display()))
        })?;

        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::debug!("loaded upload {} ({} bytes)", filename, bytes.len());
        Ok(Self::new(filename, mime_type, bytes))
    }
}

/// MIME type of the image formats accepted for upload
pub fn mime_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// What gets analyzed. Both variants are treated the same downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisInput {
    Captured(CapturedImage),
    Uploaded(UploadedFile),
}

impl AnalysisInput {
    pub fn filename(&self) -> &str {
        match self {
            Self::Captured(image) => &image.filename,
            Self::Uploaded(file) => &file.filename,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Self::Captured(image) => &image.mime_type,
            Self::Uploaded(file) => &file.mime_type,
        }
    }

    /// Moves the bytes into the artifact sent to the service
    pub fn into_artifact(self) -> ImageArtifact {
        match self {
            Self::Captured(image) => ImageArtifact::new(image.filename, image.mime_type, image.bytes),
            Self::Uploaded(file) => ImageArtifact::new(file.filename, file.mime_type, file.bytes),
        }
    }
}

impl From<CapturedImage> for AnalysisInput {
    fn from(image: CapturedImage) -> Self {
        Self::Captured(image)
    }
}

impl From<UploadedFile> for AnalysisInput {
    fn from(file: UploadedFile) -> Self {
        Self::Uploaded(file)
    }
}

#[derive(Debug, Default)]
struct Presentation {
    source: Option<ImageArtifact>,
    segmentation: Option<SegmentationResult>,
    report: Option<SustainabilityReport>,
    insights: Option<Insights>,
    error: Option<String>,
}

/// State the UI renders: the busy flag, the latest results and the last error message
#[derive(Debug, Default)]
pub struct PresentationState {
    busy: AtomicBool,
    inner: Mutex<Presentation>,
}

/// Holds the busy flag; dropping it clears the flag
#[derive(Debug)]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl PresentationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claims the busy flag, failing if another capture holds it
    pub fn try_begin(&self) -> Result<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::CaptureInProgress)?;
        Ok(BusyGuard { flag: &self.busy })
    }

    fn lock(&self) -> MutexGuard<'_, Presentation> {
        // Presentation holds plain data, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Forgets every result and error from a previous analysis
    pub fn clear(&self) {
        *self.lock() = Presentation::default();
    }

    /// Logs `error` and keeps its user-facing message for display
    pub fn record_error(&self, error: &Error) {
        log::error!("{}", error);
        self.lock().error = Some(error.user_message().to_string());
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn source_image(&self) -> Option<ImageArtifact> {
        self.lock().source.clone()
    }

    pub fn segmentation(&self) -> Option<SegmentationResult> {
        self.lock().segmentation.clone()
    }

    pub fn report(&self) -> Option<SustainabilityReport> {
        self.lock().report.clone()
    }

    pub fn insights(&self) -> Option<Insights> {
        self.lock().insights.clone()
    }
}

/// Forwards inputs to an [`AnalysisService`] and publishes the outcome
pub struct ResultDispatcher {
    service: Arc<dyn AnalysisService>,
    state: Arc<PresentationState>,
}

impl ResultDispatcher {
    pub fn new(service: Arc<dyn AnalysisService>, state: Arc<PresentationState>) -> Self {
        Self { service, state }
    }

    pub fn state(&self) -> &Arc<PresentationState> {
        &self.state
    }

    /// Sends `input` for segmentation. On failure no segmentation is published.
    pub async fn dispatch(&self, input: AnalysisInput) -> Result<SegmentationResult> {
        let artifact = input.into_artifact();
        log::info!(
            "dispatching {} ({}, {} bytes) for segmentation",
            artifact.filename,
            artifact.mime_type,
            artifact.bytes.len()
        );
        {
            let mut state = self.state.lock();
            state.segmentation = None;
            state.error = None;
        }

        let result = self.service.segment_image(&artifact).await;
        let mut state = self.state.lock();
        state.source = Some(artifact);
        match result {
            Ok(segmentation) => {
                state.segmentation = Some(segmentation.clone());
                Ok(segmentation)
            }
            Err(e) => {
                drop(state);
                self.state.record_error(&e);
                Err(e)
            }
        }
    }

    pub async fn request_recommendations(&self, request: &SustainabilityRequest) -> Result<SustainabilityReport> {
        match self.service.sustainability_report(request).await {
            Ok(report) => {
                self.state.lock().report = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                self.state.record_error(&e);
                Err(e)
            }
        }
    }

    pub async fn request_insights(&self, request: &InsightRequest) -> Result<Insights> {
        match self.service.contextual_insights(request).await {
            Ok(insights) => {
                self.state.lock().insights = Some(insights.clone());
                Ok(insights)
            }
            Err(e) => {
                self.state.record_error(&e);
                Err(e)
            }
        }
    }
}
