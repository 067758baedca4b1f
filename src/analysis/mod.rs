//! Request/response contracts of the remote analysis service

pub mod client;
pub mod types;

pub use client::{AnalysisService, GenerativeAnalysisClient};
pub use types::{
    topic_key, ImageArtifact, InsightRequest, InsightTopic, Insights, LandCoverBreakdown,
    LandCoverCategory, SegmentationResult, SustainabilityReport, SustainabilityRequest,
};
