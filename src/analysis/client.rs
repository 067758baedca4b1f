use super::types::{
    ImageArtifact, InsightRequest, Insights, LandCoverBreakdown, SegmentationResult,
    SustainabilityReport, SustainabilityRequest,
};
use crate::core::config::AnalysisConfig;
use crate::core::geo::LatLngBounds;
use crate::{AnalysisContract, Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The remote analysis collaborator, one method per contract.
///
/// Implementations must return `Error::AiResponse` for the matching
/// contract whenever the reply is incomplete; callers never see partial data.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn segment_image(&self, image: &ImageArtifact) -> Result<SegmentationResult>;

    async fn sustainability_report(&self, request: &SustainabilityRequest) -> Result<SustainabilityReport>;

    async fn contextual_insights(&self, request: &InsightRequest) -> Result<Insights>;
}

// generateContent wire types

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn image(image: &ImageArtifact) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: STANDARD.encode(&image.bytes),
            }),
        }
    }
}

/// Client for a Gemini-style `generateContent` endpoint
pub struct GenerativeAnalysisClient {
    client: reqwest::Client,
    config: AnalysisConfig,
}

impl GenerativeAnalysisClient {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Config(
                "no analysis API key; build with MAPSIGHT_API_KEY or call with_api_key".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    async fn generate(
        &self,
        contract: AnalysisContract,
        model: &str,
        parts: Vec<Part>,
        generation_config: GenerationConfig,
    ) -> Result<GenerateContentResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            model
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts,
            }],
            generation_config,
        };

        log::debug!("{} request to {}", contract, url);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.config.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ai(contract, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::ai(contract, format!("HTTP {}: {}", status, text.trim())));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| Error::ai(contract, format!("malformed response: {}", e)))
    }
}

#[async_trait]
impl AnalysisService for GenerativeAnalysisClient {
    async fn segment_image(&self, image: &ImageArtifact) -> Result<SegmentationResult> {
        if image.is_empty() {
            return Err(Error::ai(AnalysisContract::Segmentation, "empty input image"));
        }
        let parts = vec![Part::text(segmentation_prompt()), Part::image(image)];
        let config = GenerationConfig {
            response_mime_type: None,
            response_modalities: Some(vec!["TEXT", "IMAGE"]),
        };
        let response = self
            .generate(AnalysisContract::Segmentation, &self.config.image_model, parts, config)
            .await?;
        parse_segmentation(&response)
    }

    async fn sustainability_report(&self, request: &SustainabilityRequest) -> Result<SustainabilityReport> {
        let mut parts = vec![Part::text(sustainability_prompt(request))];
        if let Some(image) = request.image.as_ref().filter(|i| !i.is_empty()) {
            parts.push(Part::image(image));
        }
        let response = self
            .generate(AnalysisContract::Sustainability, &self.config.model, parts, json_output())
            .await?;
        parse_sustainability(&response)
    }

    async fn contextual_insights(&self, request: &InsightRequest) -> Result<Insights> {
        let keys = request.requested_keys();
        if keys.is_empty() {
            return Err(Error::ai(AnalysisContract::Insights, "no topics requested"));
        }
        let parts = vec![Part::text(insights_prompt(request))];
        let response = self
            .generate(AnalysisContract::Insights, &self.config.model, parts, json_output())
            .await?;
        parse_insights(&response, &keys)
    }
}

fn json_output() -> GenerationConfig {
    GenerationConfig {
        response_mime_type: Some("application/json"),
        response_modalities: None,
    }
}

fn describe_bounds(bounds: &LatLngBounds) -> String {
    format!(
        "south {:.6}, west {:.6}, north {:.6}, east {:.6}",
        bounds.south(),
        bounds.west(),
        bounds.north(),
        bounds.east()
    )
}

fn segmentation_prompt() -> String {
    "Segment this aerial map image into the land-cover classes Building, Road, Land, \
     Vegetation, Water and Unlabeled. Return a color-coded segmentation image and a JSON \
     object with the percentage of the image covered by each class, using exactly the keys \
     \"Building\", \"Road\", \"Land\", \"Vegetation\", \"Water\" and \"Unlabeled\" with numeric \
     values between 0 and 100."
        .to_string()
}

fn sustainability_prompt(request: &SustainabilityRequest) -> String {
    let area = request
        .bounds
        .as_ref()
        .map(|b| format!("The area is bounded by {}. ", describe_bounds(b)))
        .unwrap_or_default();
    format!(
        "{}Land cover is {:.1}% urban, {:.1}% vegetation and {:.1}% water, with a population \
         density of about {:.0} people per square kilometre. Assess the sustainability of this \
         area and reply with a JSON object with the keys \"district_name\" (string or null), \
         \"estimated_population\" (integer or null), \"solar_potential\", \
         \"green_space_potential\", \"water_conservation_potential\", \
         \"biodiversity_preservation\" (each 0-100), \"recommendations\" (array of strings, most \
         important first), \"sustainability_index\" (0-100) and \"analysis\" (one paragraph).",
        area,
        request.urban_percentage,
        request.vegetation_percentage,
        request.water_percentage,
        request.population_density
    )
}

fn insights_prompt(request: &InsightRequest) -> String {
    let topics = request
        .all_topics()
        .iter()
        .map(|t| format!("\"{}\" ({})", t.key(), t.label()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Describe the district bounded by {}. Reply with a JSON object containing \
         \"district_name\" and one paragraph of text for each of these keys: {}.",
        describe_bounds(&request.bounds),
        topics
    )
}

fn candidate_parts(response: &GenerateContentResponse, contract: AnalysisContract) -> Result<&[Part]> {
    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| Error::ai(contract, "no candidates in response"))?;
    match candidate.content.as_ref() {
        Some(content) if !content.parts.is_empty() => Ok(&content.parts),
        _ => Err(Error::ai(
            contract,
            format!(
                "candidate has no content (finish reason {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        )),
    }
}

/// Strips a Markdown code fence around a JSON reply, if present
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

fn parse_json_text<T: DeserializeOwned>(parts: &[Part], contract: AnalysisContract) -> Result<T> {
    let text = parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .find(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::ai(contract, "response has no text part"))?;
    serde_json::from_str(strip_fence(text)).map_err(|e| Error::ai(contract, format!("invalid JSON: {}", e)))
}

pub(crate) fn parse_segmentation(response: &GenerateContentResponse) -> Result<SegmentationResult> {
    let contract = AnalysisContract::Segmentation;
    let parts = candidate_parts(response, contract)?;

    let breakdown: LandCoverBreakdown = parse_json_text(parts, contract)?;
    breakdown.validate()?;

    let inline = parts
        .iter()
        .find_map(|p| p.inline_data.as_ref())
        .ok_or_else(|| Error::ai(contract, "response has no segmented image"))?;
    let bytes = STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| Error::ai(contract, format!("segmented image is not base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(Error::ai(contract, "segmented image is empty"));
    }

    let extension = inline.mime_type.rsplit('/').next().unwrap_or("png");
    Ok(SegmentationResult {
        breakdown,
        segmented_image: ImageArtifact::new(format!("segmented.{}", extension), inline.mime_type.clone(), bytes),
    })
}

pub(crate) fn parse_sustainability(response: &GenerateContentResponse) -> Result<SustainabilityReport> {
    let contract = AnalysisContract::Sustainability;
    let parts = candidate_parts(response, contract)?;
    let report: SustainabilityReport = parse_json_text(parts, contract)?;
    report.validate()?;
    Ok(report)
}

pub(crate) fn parse_insights(response: &GenerateContentResponse, requested_keys: &[String]) -> Result<Insights> {
    let contract = AnalysisContract::Insights;
    let parts = candidate_parts(response, contract)?;
    let mut object: BTreeMap<String, serde_json::Value> = parse_json_text(parts, contract)?;

    let district_name = match object.remove("district_name") {
        Some(serde_json::Value::String(name)) => name,
        _ => return Err(Error::ai(contract, "missing district_name")),
    };
    let insights = object
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(text) => Some((key, text)),
            _ => None,
        })
        .collect();

    let insights = Insights {
        district_name,
        insights,
    };
    insights.validate(requested_keys)?;
    Ok(insights)
}
