//! Region of interest: a square box around the map center sized by a radius slider.

use crate::core::config::RegionConfig;
use crate::core::geo::{LatLng, LatLngBounds};
use crate::core::viewport::Viewport;
use crate::map::{MapWidget, ViewportSubscription};

/// Square bounding box centred on `center` with half-side `radius_m` meters.
///
/// The north/south edges lie `radius_m` away along the meridian and the
/// east/west edges `radius_m` away along the great circle through the center,
/// so the box keeps its ground size at any latitude. A radius of zero (or
/// anything non-positive) means no selection.
pub fn compute_bounds(center: LatLng, radius_m: f64) -> Option<LatLngBounds> {
    if !(radius_m > 0.0) || !center.is_valid() {
        return None;
    }

    let north = center.destination(0.0, radius_m).lat;
    let south = center.destination(180.0, radius_m).lat;
    let east = center.destination(90.0, radius_m).lng;
    let west = center.destination(270.0, radius_m).lng;

    Some(LatLngBounds::from_coords(south, west, north, east))
}

/// Tracks the viewport and the radius slider and keeps the analysis bounds current.
///
/// Every change replaces the bounds wholesale; nothing is updated in place.
#[derive(Debug)]
pub struct RegionSelector {
    config: RegionConfig,
    radius_m: f64,
    viewport: Viewport,
    bounds: Option<LatLngBounds>,
    subscription: Option<ViewportSubscription>,
}

impl RegionSelector {
    pub fn new(viewport: Viewport, config: RegionConfig) -> Self {
        let radius_m = config.clamp_radius(config.default_radius_m);
        let bounds = compute_bounds(viewport.center, radius_m);
        Self {
            config,
            radius_m,
            viewport,
            bounds,
            subscription: None,
        }
    }

    /// Creates a selector that follows `widget`'s move and zoom events
    pub fn attach(widget: &dyn MapWidget, config: RegionConfig) -> Self {
        let mut selector = Self::new(widget.viewport_snapshot(), config);
        selector.subscription = Some(widget.subscribe());
        selector
    }

    /// Stops following the widget
    pub fn detach(&mut self) {
        self.subscription = None;
    }

    /// Applies pending viewport events. Returns true when the bounds changed.
    pub fn poll(&mut self) -> bool {
        let latest = self
            .subscription
            .as_ref()
            .and_then(|subscription| subscription.latest());
        match latest {
            Some(event) => self.on_viewport_changed(event.viewport().clone()),
            None => false,
        }
    }

    /// Replaces the viewport snapshot and recomputes the bounds
    pub fn on_viewport_changed(&mut self, viewport: Viewport) -> bool {
        self.viewport = viewport;
        self.recompute()
    }

    /// Sets the radius (clamped to the configured range) and recomputes the bounds
    pub fn set_radius(&mut self, radius_m: f64) -> bool {
        self.radius_m = self.config.clamp_radius(radius_m);
        self.recompute()
    }

    fn recompute(&mut self) -> bool {
        let bounds = compute_bounds(self.viewport.center, self.radius_m);
        let changed = bounds != self.bounds;
        self.bounds = bounds;
        if changed {
            log::debug!("analysis bounds now {:?}", self.bounds);
        }
        changed
    }

    pub fn radius(&self) -> f64 {
        self.radius_m
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn bounds(&self) -> Option<&LatLngBounds> {
        self.bounds.as_ref()
    }

    /// Whether the "analyze map area" action is available
    pub fn can_analyze(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }
}
