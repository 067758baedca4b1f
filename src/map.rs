//! The map widget seen from the capture pipeline.
//!
//! The widget owns the viewport; everything else reads it through
//! [`MapWidget::viewport_snapshot`] and learns about changes from a
//! [`ViewportSubscription`] rather than from callbacks.

use crate::core::constants::FIT_BOUNDS_PADDING;
use crate::core::geo::{LatLng, LatLngBounds, Point};
use crate::core::viewport::Viewport;
use crate::prelude::HashMap;
use crate::runtime;
use crate::Result;
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Viewport change notifications published by a map widget
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportEvent {
    /// Center changed at the same zoom
    Moved(Viewport),
    /// Zoom changed
    Zoomed(Viewport),
    /// Container size changed
    Resized(Viewport),
}

impl ViewportEvent {
    pub fn viewport(&self) -> &Viewport {
        match self {
            Self::Moved(v) | Self::Zoomed(v) | Self::Resized(v) => v,
        }
    }
}

/// Capabilities the capture pipeline needs from the interactive map
#[async_trait]
pub trait MapWidget: Send + Sync {
    /// Current center, zoom and pixel size
    fn viewport_snapshot(&self) -> Viewport;

    /// Start moving the view so that `bounds` is fully visible
    fn fit_bounds(&self, bounds: &LatLngBounds);

    /// Register for viewport changes until the subscription is dropped
    fn subscribe(&self) -> ViewportSubscription;

    /// Geo to world-pixel projection consistent with the widget's tile rendering
    fn project(&self, lat_lng: &LatLng, zoom: u8) -> Point {
        self.viewport_snapshot().project(lat_lng, Some(zoom))
    }

    /// Wait for a pan/zoom animation started by [`MapWidget::fit_bounds`] to finish.
    ///
    /// Widgets that cannot signal the end of their animation keep this default,
    /// which just waits `fallback`.
    async fn wait_until_settled(&self, fallback: Duration, cancel: &CancellationToken) -> Result<()> {
        runtime::delay(fallback, cancel).await
    }
}

type SubscriberMap = HashMap<u64, Sender<ViewportEvent>>;

/// Fan-out of viewport events to any number of subscribers
#[derive(Debug, Default)]
pub struct ViewportEventBus {
    subscribers: Arc<Mutex<SubscriberMap>>,
    next_id: AtomicU64,
}

impl ViewportEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> ViewportSubscription {
        let (tx, rx) = unbounded();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.insert(id, tx);
        }
        ViewportSubscription {
            id,
            receiver: rx,
            bus: Arc::downgrade(&self.subscribers),
        }
    }

    /// Sends `event` to every live subscriber, dropping closed ones
    pub fn publish(&self, event: ViewportEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

/// Receiving end of a viewport event subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ViewportSubscription {
    id: u64,
    receiver: Receiver<ViewportEvent>,
    bus: Weak<Mutex<SubscriberMap>>,
}

impl ViewportSubscription {
    /// All events published since the last call (non-blocking)
    pub fn drain(&self) -> Vec<ViewportEvent> {
        self.receiver.try_iter().collect()
    }

    /// The most recent pending event, discarding older ones
    pub fn latest(&self) -> Option<ViewportEvent> {
        self.receiver.try_iter().last()
    }

    pub fn receiver(&self) -> &Receiver<ViewportEvent> {
        &self.receiver
    }
}

impl Drop for ViewportSubscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.bus.upgrade() {
            if let Ok(mut subscribers) = subscribers.lock() {
                subscribers.remove(&self.id);
            }
        }
    }
}

/// In-memory map widget without rendering.
///
/// Viewport changes apply immediately, so `fit_bounds` needs no settle time;
/// the fixed delay is still honoured through the default
/// [`MapWidget::wait_until_settled`].
#[derive(Debug)]
pub struct HeadlessMap {
    viewport: Mutex<Viewport>,
    events: ViewportEventBus,
    padding: f64,
}

impl HeadlessMap {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: Mutex::new(viewport),
            events: ViewportEventBus::new(),
            padding: FIT_BOUNDS_PADDING,
        }
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    /// Sets center and zoom, publishing `Moved` or `Zoomed`
    pub fn set_view(&self, center: LatLng, zoom: u8) {
        self.update(|viewport| {
            let zoom_changed = viewport.zoom != zoom.clamp(viewport.min_zoom, viewport.max_zoom);
            let next = Viewport::new(center, zoom, viewport.width, viewport.height)
                .with_zoom_limits(viewport.min_zoom, viewport.max_zoom)
                .with_tile_size(viewport.tile_size);
            let event = if zoom_changed {
                ViewportEvent::Zoomed(next.clone())
            } else {
                ViewportEvent::Moved(next.clone())
            };
            (next, Some(event))
        });
    }

    pub fn pan_to(&self, center: LatLng) {
        let zoom = self.viewport_snapshot().zoom;
        self.set_view(center, zoom);
    }

    pub fn set_zoom(&self, zoom: u8) {
        let center = self.viewport_snapshot().center;
        self.set_view(center, zoom);
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.update(|viewport| {
            let next = Viewport {
                width,
                height,
                ..viewport.clone()
            };
            (next.clone(), Some(ViewportEvent::Resized(next)))
        });
    }

    fn update(&self, f: impl FnOnce(&Viewport) -> (Viewport, Option<ViewportEvent>)) {
        let event = match self.viewport.lock() {
            Ok(mut viewport) => {
                let (next, event) = f(&viewport);
                if next == *viewport {
                    None
                } else {
                    *viewport = next;
                    event
                }
            }
            Err(_) => None,
        };
        if let Some(event) = event {
            log::debug!("viewport changed: {:?}", event);
            self.events.publish(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }
}

impl Default for HeadlessMap {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

#[async_trait]
impl MapWidget for HeadlessMap {
    fn viewport_snapshot(&self) -> Viewport {
        self.viewport
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    fn fit_bounds(&self, bounds: &LatLngBounds) {
        let padding = self.padding;
        self.update(|viewport| {
            let next = viewport.fitted_to(bounds, padding);
            let event = if next.zoom != viewport.zoom {
                ViewportEvent::Zoomed(next.clone())
            } else {
                ViewportEvent::Moved(next.clone())
            };
            (next, Some(event))
        });
    }

    fn subscribe(&self) -> ViewportSubscription {
        self.events.subscribe()
    }
}
