//! Strict schemas for the three analysis contracts.
//!
//! Responses are deserialized into these types and then validated; any
//! missing field or out-of-range value rejects the whole response.

use crate::core::geo::LatLngBounds;
use crate::{AnalysisContract, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw image handed to (or returned by) the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageArtifact {
    pub filename: String,
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ImageArtifact {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Fixed land-cover classes reported by segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LandCoverCategory {
    Building,
    Road,
    Land,
    Vegetation,
    Water,
    Unlabeled,
}

impl LandCoverCategory {
    pub const ALL: [LandCoverCategory; 6] = [
        Self::Building,
        Self::Road,
        Self::Land,
        Self::Vegetation,
        Self::Water,
        Self::Unlabeled,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Building => "Building",
            Self::Road => "Road",
            Self::Land => "Land",
            Self::Vegetation => "Vegetation",
            Self::Water => "Water",
            Self::Unlabeled => "Unlabeled",
        }
    }
}

/// Share of the image covered by each category, in percent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LandCoverBreakdown {
    #[serde(rename = "Building")]
    pub building: f64,
    #[serde(rename = "Road")]
    pub road: f64,
    #[serde(rename = "Land")]
    pub land: f64,
    #[serde(rename = "Vegetation")]
    pub vegetation: f64,
    #[serde(rename = "Water")]
    pub water: f64,
    #[serde(rename = "Unlabeled")]
    pub unlabeled: f64,
}

impl LandCoverBreakdown {
    pub fn get(&self, category: LandCoverCategory) -> f64 {
        match category {
            LandCoverCategory::Building => self.building,
            LandCoverCategory::Road => self.road,
            LandCoverCategory::Land => self.land,
            LandCoverCategory::Vegetation => self.vegetation,
            LandCoverCategory::Water => self.water,
            LandCoverCategory::Unlabeled => self.unlabeled,
        }
    }

    fn get_mut(&mut self, category: LandCoverCategory) -> &mut f64 {
        match category {
            LandCoverCategory::Building => &mut self.building,
            LandCoverCategory::Road => &mut self.road,
            LandCoverCategory::Land => &mut self.land,
            LandCoverCategory::Vegetation => &mut self.vegetation,
            LandCoverCategory::Water => &mut self.water,
            LandCoverCategory::Unlabeled => &mut self.unlabeled,
        }
    }

    /// Built-up share: buildings plus roads
    pub fn urban(&self) -> f64 {
        self.building + self.road
    }

    pub fn total(&self) -> f64 {
        LandCoverCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Derives percentages from a class-index mask with one label per pixel.
    ///
    /// `classes[i]` names the category of label `i`; labels without an entry
    /// count as `Unlabeled`. Returns `None` for an empty mask.
    pub fn from_label_mask(mask: &[u8], classes: &[LandCoverCategory]) -> Option<Self> {
        if mask.is_empty() {
            return None;
        }
        let mut counts = [0usize; 256];
        for label in mask {
            counts[*label as usize] += 1;
        }

        let mut breakdown = Self::default();
        for (label, count) in counts.iter().enumerate().filter(|(_, c)| **c > 0) {
            let category = classes
                .get(label)
                .copied()
                .unwrap_or(LandCoverCategory::Unlabeled);
            *breakdown.get_mut(category) += *count as f64;
        }

        let scale = 100.0 / mask.len() as f64;
        for category in LandCoverCategory::ALL {
            *breakdown.get_mut(category) *= scale;
        }
        Some(breakdown)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for category in LandCoverCategory::ALL {
            let value = self.get(category);
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::ai(
                    AnalysisContract::Segmentation,
                    format!("{} percentage {} out of range", category.label(), value),
                ));
            }
        }
        Ok(())
    }
}

/// Segmentation contract output
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationResult {
    pub breakdown: LandCoverBreakdown,
    pub segmented_image: ImageArtifact,
}

/// Sustainability contract input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SustainabilityRequest {
    pub bounds: Option<LatLngBounds>,
    pub urban_percentage: f64,
    pub vegetation_percentage: f64,
    pub water_percentage: f64,
    /// People per square kilometre
    pub population_density: f64,
    #[serde(skip)]
    pub image: Option<ImageArtifact>,
}

impl SustainabilityRequest {
    /// Builds a request from a segmentation of the same region
    pub fn from_segmentation(
        bounds: Option<LatLngBounds>,
        segmentation: &SegmentationResult,
        population_density: f64,
    ) -> Self {
        Self {
            bounds,
            urban_percentage: segmentation.breakdown.urban(),
            vegetation_percentage: segmentation.breakdown.vegetation,
            water_percentage: segmentation.breakdown.water,
            population_density,
            image: Some(segmentation.segmented_image.clone()),
        }
    }
}

/// Sustainability contract output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SustainabilityReport {
    #[serde(default)]
    pub district_name: Option<String>,
    #[serde(default)]
    pub estimated_population: Option<u64>,
    pub solar_potential: f64,
    pub green_space_potential: f64,
    pub water_conservation_potential: f64,
    pub biodiversity_preservation: f64,
    pub recommendations: Vec<String>,
    pub sustainability_index: f64,
    pub analysis: String,
}

impl SustainabilityReport {
    pub(crate) fn validate(&self) -> Result<()> {
        let metrics = [
            ("solar_potential", self.solar_potential),
            ("green_space_potential", self.green_space_potential),
            ("water_conservation_potential", self.water_conservation_potential),
            ("biodiversity_preservation", self.biodiversity_preservation),
            ("sustainability_index", self.sustainability_index),
        ];
        for (name, value) in metrics {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::ai(
                    AnalysisContract::Sustainability,
                    format!("{} = {} is outside 0..=100", name, value),
                ));
            }
        }
        if self.recommendations.iter().all(|r| r.trim().is_empty()) {
            return Err(Error::ai(
                AnalysisContract::Sustainability,
                "no recommendations",
            ));
        }
        if self.analysis.trim().is_empty() {
            return Err(Error::ai(AnalysisContract::Sustainability, "empty analysis"));
        }
        Ok(())
    }
}

/// Subjects the insights contract can be asked about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsightTopic {
    History,
    Demographics,
    Economy,
    Infrastructure,
    Environment,
    Culture,
    Custom(String),
}

impl InsightTopic {
    pub fn label(&self) -> &str {
        match self {
            Self::History => "History",
            Self::Demographics => "Demographics",
            Self::Economy => "Economy",
            Self::Infrastructure => "Infrastructure",
            Self::Environment => "Environment",
            Self::Culture => "Culture",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Key of this topic in the insights reply
    pub fn key(&self) -> String {
        topic_key(self.label())
    }
}

/// Lower-cases `label` and joins its words with underscores
pub fn topic_key(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Insights contract input
#[derive(Debug, Clone, PartialEq)]
pub struct InsightRequest {
    pub bounds: LatLngBounds,
    pub topics: Vec<InsightTopic>,
    pub custom_topic: Option<String>,
}

impl InsightRequest {
    pub fn new(bounds: LatLngBounds, topics: Vec<InsightTopic>) -> Self {
        Self {
            bounds,
            topics,
            custom_topic: None,
        }
    }

    pub fn with_custom_topic(mut self, topic: impl Into<String>) -> Self {
        self.custom_topic = Some(topic.into());
        self
    }

    /// Every topic asked for, the free-text one last; duplicates and blanks dropped
    pub fn all_topics(&self) -> Vec<InsightTopic> {
        let mut topics: Vec<InsightTopic> = Vec::with_capacity(self.topics.len() + 1);
        let custom = self
            .custom_topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| InsightTopic::Custom(t.to_string()));

        for topic in self.topics.iter().cloned().chain(custom) {
            if !topic.key().is_empty() && !topics.iter().any(|t| t.key() == topic.key()) {
                topics.push(topic);
            }
        }
        topics
    }

    pub fn requested_keys(&self) -> Vec<String> {
        self.all_topics().iter().map(InsightTopic::key).collect()
    }
}

/// Insights contract output: one paragraph per topic key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub district_name: String,
    pub insights: BTreeMap<String, String>,
}

impl Insights {
    pub fn get(&self, topic: &InsightTopic) -> Option<&str> {
        self.insights.get(&topic.key()).map(String::as_str)
    }

    pub(crate) fn validate(&self, requested_keys: &[String]) -> Result<()> {
        if self.district_name.trim().is_empty() {
            return Err(Error::ai(AnalysisContract::Insights, "missing district name"));
        }
        for key in requested_keys {
            match self.insights.get(key) {
                Some(text) if !text.trim().is_empty() => {}
                _ => {
                    return Err(Error::ai(
                        AnalysisContract::Insights,
                        format!("missing insight for {}", key),
                    ))
                }
            }
        }
        Ok(())
    }
}
