//! Progressive tiled preview
//!
//! [`RenderJob`] drives a [`TileInterpreter`] from a timer, one tile per
//! tick, so the surrounding task keeps running between tiles. Tiles are
//! collected into a [`TileMosaic`] image as they complete.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use image::{ImageBuffer, Luma};
use terra_core::{Tile, TileInterpreter, TileObserver};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::project::HeightRange;

/// Roughly 30 frames per second.
pub const DEFAULT_TICK: Duration = Duration::from_millis(33);

pub type HeightImage = ImageBuffer<Luma<u16>, Vec<u16>>;

struct MosaicState {
    image: HeightImage,
    range: HeightRange,
    tiles: usize,
}

/// Full-raster 16-bit height image assembled from tiles.
///
/// Clones share the same image, so one clone can be registered with an
/// interpreter while another is kept for saving.
#[derive(Clone)]
pub struct TileMosaic {
    state: Rc<RefCell<MosaicState>>,
}

impl TileMosaic {
    pub fn new(width: usize, height: usize, range: HeightRange) -> Self {
        let image = ImageBuffer::new(width as u32, height as u32);
        Self {
            state: Rc::new(RefCell::new(MosaicState { image, range, tiles: 0 })),
        }
    }

    pub fn tiles_received(&self) -> usize {
        self.state.borrow().tiles
    }

    pub fn pixel(&self, x: u32, y: u32) -> u16 {
        self.state.borrow().image.get_pixel(x, y).0[0]
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.state.borrow().image.save(path)?;
        info!(path = %path.display(), tiles = self.tiles_received(), "mosaic saved");
        Ok(())
    }
}

impl TileObserver for TileMosaic {
    fn observe(&mut self, tile: &Tile) {
        let mut state = self.state.borrow_mut();
        let (width, height) = state.image.dimensions();
        let range = state.range;

        // Samples past the image edge are dropped.
        for y in 0..tile.height() {
            let py = (tile.offset_y() + y) as u32;
            if py >= height {
                break;
            }
            for (x, sample) in tile.line(y).iter().enumerate() {
                let px = (tile.offset_x() + x) as u32;
                if px >= width {
                    break;
                }
                state.image.put_pixel(px, py, Luma([range.quantize(sample[0])]));
            }
        }
        state.tiles += 1;
    }
}

/// Requests early termination of a running [`RenderJob`].
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    pub total: usize,
}

pub struct RenderJob {
    tick: Duration,
    cancel: watch::Receiver<bool>,
}

impl RenderJob {
    pub fn new(tick: Duration) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { tick, cancel: rx }, CancelHandle(tx))
    }

    /// Renders one whole frame, a tile per tick.
    ///
    /// The frame is always ended before returning, including on error and
    /// on cancellation, which yields [`Error::Cancelled`].
    pub async fn run(&mut self, interpreter: &mut TileInterpreter) -> Result<RenderSummary> {
        interpreter.begin_frame()?;
        let total = interpreter.tiles_remaining();

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut rendered = 0;
        let mut cancel_open = true;
        let outcome = loop {
            if *self.cancel.borrow() {
                break Err(Error::Cancelled { rendered, total });
            }
            if interpreter.frame_is_done() {
                break Ok(RenderSummary { rendered, total });
            }

            tokio::select! {
                changed = self.cancel.changed(), if cancel_open => {
                    // Without a sender nobody can cancel any more.
                    cancel_open = changed.is_ok();
                }
                _ = ticker.tick() => {
                    if let Err(e) = interpreter.poll_tiles(self.tick) {
                        break Err(e.into());
                    }
                    rendered += 1;
                    debug!(rendered, total, "preview tile");
                }
            }
        };

        interpreter.end_frame()?;
        outcome
    }
}
