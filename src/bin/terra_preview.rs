use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use terra::{
    Error, HeightPreset, Project, RenderJob, Sampling, TileMesh, TileMosaic, DEFAULT_TICK,
};
use terra_core::{Tile, TileInterpreter};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "terra-preview")]
#[command(about = "Progressively render a terrain project tile by tile into a preview PNG")]
struct Args {
    #[arg(long)]
    project: Option<PathBuf>,

    #[arg(long)]
    width: Option<usize>,

    #[arg(long)]
    height: Option<usize>,

    #[arg(long, value_enum)]
    height_preset: Option<HeightPreset>,

    #[arg(long, value_enum)]
    sampling: Option<Sampling>,

    /// Milliseconds between tiles, 33 by default
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Cancel the frame after this many tiles
    #[arg(long)]
    max_tiles: Option<usize>,

    #[arg(long, default_value = "preview.png")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terra=info,terra_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut project = match &args.project {
        Some(path) => Project::load(path)?,
        None => Project::default(),
    };
    if let Some(w) = args.width.filter(|&w| w > 0) {
        project.resolution.width = w;
    }
    if let Some(h) = args.height.filter(|&h| h > 0) {
        project.resolution.height = h;
    }
    if let Some(preset) = args.height_preset {
        project.height = preset;
    }
    if let Some(sampling) = args.sampling {
        project.sampling = sampling;
    }
    project.validate()?;

    let (width, height) = (project.resolution.width, project.resolution.height);
    let (height_expr, _) = project.expressions();

    let mut interpreter = TileInterpreter::new();
    interpreter.set_resolution(width, height);
    interpreter.set_sampling(project.sampling.into());
    interpreter.set_height_expr(&height_expr)?;

    let mosaic = TileMosaic::new(width, height, project.height_range);
    interpreter.add_tile_observer(mosaic.clone());

    let triangles = Rc::new(Cell::new(0usize));
    let counter = triangles.clone();
    interpreter.add_tile_observer(move |tile: &Tile| match TileMesh::from_tile(tile) {
        Ok(mesh) => counter.set(counter.get() + mesh.triangle_count()),
        Err(e) => warn!(error = %e, "tile mesh skipped"),
    });

    let tick = args.tick_ms.map_or(DEFAULT_TICK, Duration::from_millis);
    let (mut job, cancel) = RenderJob::new(tick);
    let _cancel = match args.max_tiles {
        Some(limit) => {
            let mut seen = 0;
            interpreter.add_tile_observer(move |_: &Tile| {
                seen += 1;
                if seen >= limit {
                    cancel.cancel();
                }
            });
            None
        }
        None => Some(cancel),
    };

    match job.run(&mut interpreter).await {
        Ok(summary) => {
            info!(tiles = summary.total, triangles = triangles.get(), "preview complete")
        }
        Err(Error::Cancelled { rendered, total }) => {
            warn!(rendered, total, "preview cancelled, saving partial mosaic")
        }
        Err(e) => return Err(e.into()),
    }

    mosaic.save(&args.out)?;
    eprintln!("Wrote {} ({} tiles)", args.out.display(), mosaic.tiles_received());
    Ok(())
}
