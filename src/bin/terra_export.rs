use std::path::PathBuf;

use clap::Parser;
use terra::{export_project, ColorPreset, HeightPreset, Project};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "terra-export")]
#[command(about = "Render a terrain project to a 16-bit height PNG and an RGB color PNG")]
struct Args {
    /// Project file; flags below override its values
    #[arg(long)]
    project: Option<PathBuf>,

    #[arg(long)]
    width: Option<usize>,

    #[arg(long)]
    height: Option<usize>,

    #[arg(long, value_enum)]
    height_preset: Option<HeightPreset>,

    #[arg(long, value_enum)]
    color_preset: Option<ColorPreset>,

    /// Height written as 0
    #[arg(long, allow_negative_numbers = true)]
    min: Option<f32>,

    /// Height written as 65535
    #[arg(long, allow_negative_numbers = true)]
    max: Option<f32>,

    #[arg(long)]
    height_out: Option<PathBuf>,

    #[arg(long)]
    color_out: Option<PathBuf>,
}

impl Args {
    fn into_project(self) -> terra::Result<Project> {
        let mut project = match &self.project {
            Some(path) => Project::load(path)?,
            None => Project::default(),
        };

        if let Some(w) = self.width.filter(|&w| w > 0) {
            project.resolution.width = w;
        }
        if let Some(h) = self.height.filter(|&h| h > 0) {
            project.resolution.height = h;
        }
        if let Some(preset) = self.height_preset {
            project.height = preset;
        }
        if let Some(preset) = self.color_preset {
            project.color = preset;
        }
        if let Some(min) = self.min {
            project.height_range.min = min;
        }
        if let Some(max) = self.max {
            project.height_range.max = max;
        }
        if let Some(path) = self.height_out {
            project.outputs.height = path;
        }
        if let Some(path) = self.color_out {
            project.outputs.color = path;
        }
        Ok(project)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terra=info,terra_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let project = Args::parse().into_project()?;
    export_project(&project)?;

    eprintln!(
        "Wrote {} and {} ({}x{})",
        project.outputs.height.display(),
        project.outputs.color.display(),
        project.resolution.width,
        project.resolution.height,
    );
    Ok(())
}
