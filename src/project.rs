//! Project settings loaded from JSON

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use terra_core::{ExprRef, TileSampling};
use tracing::debug;

use crate::error::{Error, Result};
use crate::presets::{ColorPreset, HeightPreset};

pub const DEFAULT_RESOLUTION: usize = 1024;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub resolution: Resolution,
    pub height_range: HeightRange,
    pub height: HeightPreset,
    pub color: ColorPreset,
    pub outputs: Outputs,
    pub sampling: Sampling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    #[serde(deserialize_with = "positive_or_default")]
    pub width: usize,
    #[serde(deserialize_with = "positive_or_default")]
    pub height: usize,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: DEFAULT_RESOLUTION,
            height: DEFAULT_RESOLUTION,
        }
    }
}

/// Zero and negative sizes are treated as unset.
fn positive_or_default<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    Ok(usize::try_from(value).ok().filter(|&v| v > 0).unwrap_or(DEFAULT_RESOLUTION))
}

/// Heights mapped to the ends of the 16-bit output range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightRange {
    pub min: f32,
    pub max: f32,
}

impl HeightRange {
    pub fn new(min: f32, max: f32) -> Result<Self> {
        let range = Self { min, max };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        // Written so NaN bounds fail too.
        if !(self.max > self.min) {
            return Err(Error::InvalidHeightRange { min: self.min, max: self.max });
        }
        Ok(())
    }

    /// Maps `h` into `[0, 1]` for heights inside the range.
    pub fn normalize(&self, h: f32) -> f32 {
        (h - self.min) / (self.max - self.min)
    }

    /// Quantizes `h` to 16 bits. Out-of-range heights saturate, NaN becomes 0.
    pub fn quantize(&self, h: f32) -> u16 {
        (self.normalize(h) * u16::MAX as f32) as u16
    }
}

impl Default for HeightRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outputs {
    pub height: PathBuf,
    pub color: PathBuf,
}

impl Default for Outputs {
    fn default() -> Self {
        Self {
            height: PathBuf::from("height.png"),
            color: PathBuf::from("color.png"),
        }
    }
}

/// Serializable mirror of [`TileSampling`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sampling {
    #[default]
    PerTile,
    Raster,
}

impl From<Sampling> for TileSampling {
    fn from(sampling: Sampling) -> Self {
        match sampling {
            Sampling::PerTile => TileSampling::PerTile,
            Sampling::Raster => TileSampling::Raster,
        }
    }
}

impl Project {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let project = Self::from_json(&text)?;
        debug!(path = %path.display(), ?project, "project loaded");
        Ok(project)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks everything deserialization cannot.
    pub fn validate(&self) -> Result<()> {
        self.height_range.validate()
    }

    /// Height and color expressions; the color tree may share the height tree.
    pub fn expressions(&self) -> (ExprRef, ExprRef) {
        let height = self.height.build();
        let color = self.color.build(&height);
        (height, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let project = Project::from_json("{}").unwrap();
        assert_eq!(project, Project::default());
        assert_eq!(project.resolution.width, 1024);
        assert_eq!(project.resolution.height, 1024);
        assert_eq!(project.height_range, HeightRange { min: 0.0, max: 1.0 });
        assert_eq!(project.outputs.height, PathBuf::from("height.png"));
        assert_eq!(project.sampling, Sampling::PerTile);
    }

    #[test]
    fn test_full_document() {
        let project = Project::from_json(
            r#"{
                "resolution": { "width": 300, "height": 200 },
                "height_range": { "min": -1.0, "max": 2.0 },
                "height": "ripple",
                "color": "height",
                "outputs": { "height": "out/h.png", "color": "out/c.png" },
                "sampling": "raster"
            }"#,
        )
        .unwrap();
        assert_eq!(project.resolution, Resolution { width: 300, height: 200 });
        assert_eq!(project.height_range, HeightRange { min: -1.0, max: 2.0 });
        assert_eq!(project.height, HeightPreset::Ripple);
        assert_eq!(project.color, ColorPreset::Height);
        assert_eq!(project.outputs.color, PathBuf::from("out/c.png"));
        assert_eq!(TileSampling::from(project.sampling), TileSampling::Raster);
    }

    #[test]
    fn test_non_positive_resolution_falls_back() {
        let project =
            Project::from_json(r#"{ "resolution": { "width": 0, "height": -5 } }"#).unwrap();
        assert_eq!(project.resolution, Resolution::default());

        let project = Project::from_json(r#"{ "resolution": { "height": 64 } }"#).unwrap();
        assert_eq!(project.resolution, Resolution { width: 1024, height: 64 });
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            Project::from_json(r#"{ "height": "mountain" }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(Project::from_json("not json"), Err(Error::Config(_))));
    }

    #[test]
    fn test_height_range_validation() {
        assert!(HeightRange::new(0.0, 1.0).is_ok());
        assert!(matches!(
            HeightRange::new(1.0, 1.0),
            Err(Error::InvalidHeightRange { min, max }) if min == 1.0 && max == 1.0
        ));
        assert!(HeightRange::new(f32::NAN, 1.0).is_err());

        let project =
            Project::from_json(r#"{ "height_range": { "min": 2.0, "max": 1.0 } }"#).unwrap();
        assert!(project.validate().is_err());
    }

    #[test]
    fn test_quantize() {
        let range = HeightRange { min: -1.0, max: 1.0 };
        assert_eq!(range.quantize(-1.0), 0);
        assert_eq!(range.quantize(0.0), 32767);
        assert_eq!(range.quantize(1.0), 65535);
        assert_eq!(range.quantize(5.0), 65535);
        assert_eq!(range.quantize(-5.0), 0);
        assert_eq!(range.quantize(f32::NAN), 0);
    }

    #[test]
    fn test_load_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terrain.json");
        let mut project = Project::default();
        project.height = HeightPreset::Dome;
        std::fs::write(&path, project.to_json().unwrap()).unwrap();
        assert_eq!(Project::load(&path).unwrap(), project);

        assert!(matches!(Project::load(dir.path().join("missing.json")), Err(Error::Io(_))));
    }
}
