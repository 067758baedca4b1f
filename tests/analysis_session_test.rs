use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use mapsight::prelude::*;
use std::collections::BTreeMap;
use std::sync::Mutex;

struct TileServer {
    calls: Mutex<Vec<TileCoord>>,
    fail_all: bool,
    delay: Duration,
}

impl TileServer {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_all: false,
            delay: Duration::ZERO,
        }
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn requested(&self) -> Vec<TileCoord> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TileFetcher for TileServer {
    async fn fetch_tile(&self, coord: TileCoord) -> Result<RgbaImage> {
        tokio::time::sleep(self.delay).await;
        self.calls.lock().unwrap().push(coord);
        if self.fail_all {
            return Err(Error::TileFetch {
                tile: coord,
                reason: "connection reset".into(),
            });
        }
        Ok(RgbaImage::from_pixel(256, 256, Rgba([90, 140, 90, 255])))
    }
}

/// Stands in for the remote analysis service
#[derive(Default)]
struct MockAnalysisService {
    omit_segmented_image: bool,
    images: Mutex<Vec<ImageArtifact>>,
    sustainability_requests: Mutex<Vec<SustainabilityRequest>>,
    insight_keys: Mutex<Vec<Vec<String>>>,
}

fn breakdown() -> LandCoverBreakdown {
    LandCoverBreakdown {
        building: 30.0,
        road: 15.0,
        land: 20.0,
        vegetation: 25.0,
        water: 7.0,
        unlabeled: 3.0,
    }
}

#[async_trait]
impl AnalysisService for MockAnalysisService {
    async fn segment_image(&self, image: &ImageArtifact) -> Result<SegmentationResult> {
        self.images.lock().unwrap().push(image.clone());
        if self.omit_segmented_image {
            return Err(Error::AiResponse {
                contract: AnalysisContract::Segmentation,
                reason: "response has no segmented image".into(),
            });
        }
        Ok(SegmentationResult {
            breakdown: breakdown(),
            segmented_image: ImageArtifact::new("segmented.png", "image/png", vec![7, 7, 7]),
        })
    }

    async fn sustainability_report(&self, request: &SustainabilityRequest) -> Result<SustainabilityReport> {
        self.sustainability_requests.lock().unwrap().push(request.clone());
        Ok(SustainabilityReport {
            district_name: Some("Centro".into()),
            estimated_population: None,
            solar_potential: 70.0,
            green_space_potential: 40.0,
            water_conservation_potential: 50.0,
            biodiversity_preservation: 35.0,
            recommendations: vec!["Plant trees".into(), "Add solar".into()],
            sustainability_index: 61.0,
            analysis: "Mostly built up.".into(),
        })
    }

    async fn contextual_insights(&self, request: &InsightRequest) -> Result<Insights> {
        let keys = request.requested_keys();
        self.insight_keys.lock().unwrap().push(keys.clone());
        Ok(Insights {
            district_name: "Centro".into(),
            insights: keys
                .into_iter()
                .map(|k| (k.clone(), format!("About {}.", k)))
                .collect::<BTreeMap<_, _>>(),
        })
    }
}

struct Fixture {
    map: Arc<HeadlessMap>,
    tiles: Arc<TileServer>,
    service: Arc<MockAnalysisService>,
    session: Arc<AnalysisSession>,
}

fn fixture(tiles: TileServer, service: MockAnalysisService) -> Fixture {
    fixture_with_config(tiles, service, &MapsightConfig::default())
}

fn fixture_with_config(tiles: TileServer, service: MockAnalysisService, config: &MapsightConfig) -> Fixture {
    let map = Arc::new(HeadlessMap::new(Viewport::new(LatLng::new(41.3874, 2.1686), 13, 800, 600)));
    let tiles = Arc::new(tiles);
    let service = Arc::new(service);
    let session = Arc::new(AnalysisSession::new(
        map.clone(),
        tiles.clone(),
        service.clone(),
        config,
    ));
    Fixture {
        map,
        tiles,
        service,
        session,
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_radius_disables_analysis() {
    let f = fixture(TileServer::new(), MockAnalysisService::default());
    assert!(f.session.can_analyze());

    f.session.set_radius(0.0);
    assert!(!f.session.can_analyze());

    let result = f.session.analyze_map_area(&CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::NoSelection)));
    assert_eq!(f.tiles.calls(), 0);
    assert!(f.service.images.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_map_analysis_publishes_segmentation() {
    let f = fixture(TileServer::new(), MockAnalysisService::default());

    let result = f.session.analyze_map_area(&CancellationToken::new()).await.unwrap();
    assert_eq!(result.breakdown, breakdown());

    let state = f.session.state();
    assert!(!state.is_busy());
    assert_eq!(state.segmentation(), Some(result));
    assert_eq!(state.last_error(), None);

    let sent = f.service.images.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].filename, "map-view.png");
    assert_eq!(sent[0].mime_type, "image/png");
    let decoded = image::load_from_memory(&sent[0].bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (800, 600));
}

#[tokio::test(start_paused = true)]
async fn test_missing_segmented_image_leaves_no_result() {
    let service = MockAnalysisService {
        omit_segmented_image: true,
        ..Default::default()
    };
    let f = fixture(TileServer::new(), service);

    let err = f.session.analyze_map_area(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::AiResponse { contract: AnalysisContract::Segmentation, .. }
    ));

    let state = f.session.state();
    assert!(!state.is_busy());
    assert!(state.segmentation().is_none());
    assert_eq!(state.last_error().as_deref(), Some("Failed to analyze image."));
}

#[tokio::test(start_paused = true)]
async fn test_tile_failure_never_reaches_service() {
    let tiles = TileServer {
        fail_all: true,
        ..TileServer::new()
    };
    let f = fixture(tiles, MockAnalysisService::default());

    let err = f.session.analyze_map_area(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::TileFetch { .. }));
    assert!(f.service.images.lock().unwrap().is_empty());
    assert!(!f.session.state().is_busy());
    assert_eq!(
        f.session.state().last_error().as_deref(),
        Some("Could not capture map view.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_capture_is_rejected_while_busy() {
    let tiles = TileServer {
        delay: Duration::from_secs(5),
        ..TileServer::new()
    };
    let f = fixture(tiles, MockAnalysisService::default());

    let handle = f.session.start_map_analysis();
    while !f.session.state().is_busy() {
        tokio::task::yield_now().await;
    }

    let second = f.session.analyze_map_area(&CancellationToken::new()).await;
    assert!(matches!(second, Err(Error::CaptureInProgress)));
    assert_eq!(
        f.session.state().last_error().as_deref(),
        Some("An analysis is already running.")
    );

    handle.cancel();
    let first = handle.join().await.unwrap();
    assert!(matches!(first, Err(Error::Cancelled)));
    assert!(!f.session.state().is_busy());
    assert!(f.service.images.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_bounds_follow_the_map() {
    let f = fixture(TileServer::new(), MockAnalysisService::default());
    let before = f.session.bounds().unwrap();

    f.map.pan_to(LatLng::new(41.40, 2.18));
    let after = f.session.bounds().unwrap();

    assert_ne!(before, after);
    assert!((after.center().lat - 41.40).abs() < 1e-9);
}

#[tokio::test]
async fn test_upload_is_treated_like_a_capture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aerial.png");
    RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])).save(&path).unwrap();

    let f = fixture(TileServer::new(), MockAnalysisService::default());
    let file = UploadedFile::from_path(&path).await.unwrap();
    f.session.analyze_upload(file).await.unwrap();

    assert_eq!(f.tiles.calls(), 0);
    let sent = f.service.images.lock().unwrap();
    assert_eq!(sent[0].filename, "aerial.png");
    assert_eq!(sent[0].mime_type, "image/png");
    assert!(f.session.state().segmentation().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_recommendations_use_segmentation_estimates() {
    let f = fixture(TileServer::new(), MockAnalysisService::default());
    assert!(f.session.sustainability_request(4000.0).is_none());

    f.session.analyze_map_area(&CancellationToken::new()).await.unwrap();
    let request = f.session.sustainability_request(4000.0).unwrap();
    assert_eq!(request.urban_percentage, 45.0);
    assert_eq!(request.vegetation_percentage, 25.0);
    assert_eq!(request.water_percentage, 7.0);
    assert!(request.bounds.is_some());

    let report = f.session.request_recommendations(&request).await.unwrap();
    assert_eq!(report.recommendations, vec!["Plant trees", "Add solar"]);
    assert_eq!(f.session.state().report(), Some(report));
}

#[tokio::test]
async fn test_insights_include_custom_topic() {
    let f = fixture(TileServer::new(), MockAnalysisService::default());

    let insights = f
        .session
        .request_insights(
            vec![InsightTopic::History, InsightTopic::Economy],
            Some("Night Life".into()),
        )
        .await
        .unwrap();

    assert_eq!(
        f.service.insight_keys.lock().unwrap()[0],
        vec!["history", "economy", "night_life"]
    );
    assert_eq!(insights.insights["night_life"], "About night_life.");
    assert_eq!(f.session.state().insights(), Some(insights));
}

#[tokio::test(start_paused = true)]
async fn test_capture_uses_configured_tile_grid() {
    let config = MapsightConfig::from_json_str(r#"{ "tiles": { "tile_size": 512, "max_zoom": 12 } }"#).unwrap();
    let f = fixture_with_config(TileServer::new(), MockAnalysisService::default(), &config);
    let bounds = f.session.bounds().unwrap();

    f.session.analyze_map_area(&CancellationToken::new()).await.unwrap();

    // The map fits a 1 km box well above zoom 12; the capture is capped at the source's limit
    assert!(f.map.viewport_snapshot().zoom > 12);
    let requested = f.tiles.requested();
    assert!(requested.iter().all(|t| t.z == 12));

    let expected = mapsight::capture::project_bounds(&bounds, 12, 512)
        .unwrap()
        .tile_range(512)
        .unwrap();
    assert_eq!(requested.len(), expected.len());
    assert!(requested.iter().all(|t| expected.contains(t)));
}
