//! Map-region capture: reconstructs one raster of the selected region from
//! the tiled base map.
//!
//! Stages run strictly in order: [`project::project_bounds`] →
//! [`crate::tiles::fetch_tiles`] → [`stitch::stitch`] → [`resample::resample`].
//! Every intermediate lives only for one capture.

pub mod pipeline;
pub mod project;
pub mod resample;
pub mod stitch;

pub use pipeline::CapturePipeline;
pub use project::project_bounds;
pub use resample::{resample, CapturedImage};
pub use stitch::{stitch, StitchCanvas};
