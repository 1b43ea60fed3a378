//! Terra
//!
//! Procedural terrain rendering on top of [`terra_core`]: project files,
//! preset expressions, streaming PNG export, and a progressive tiled
//! preview driven by tokio.

pub mod error;
pub mod project;
pub mod presets;
pub mod export;
pub mod mesh;
pub mod preview;

pub use error::{Error, Result};
pub use project::{HeightRange, Outputs, Project, Resolution, Sampling};
pub use presets::{ColorPreset, HeightPreset};
pub use export::{export_project, PngWriter};
pub use mesh::TileMesh;
pub use preview::{CancelHandle, RenderJob, RenderSummary, TileMosaic, DEFAULT_TICK};
