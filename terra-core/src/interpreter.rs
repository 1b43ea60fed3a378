//! Tile and scanline interpreters
//!
//! Both interpreters lower their expressions once, then evaluate them inline
//! on the calling thread. [`TileInterpreter`] spreads a frame across repeated
//! [`TileInterpreter::poll_tiles`] calls so an event loop can stay responsive;
//! [`LineInterpreter`] streams a whole raster row by row.
//!
//! When lowering fails, both interpreters keep whatever evaluator they had
//! before. [`crate::backend::CpuBackend`] resets to a zero constant instead.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::compiler::{compile, Builtins, Evaluator, Float3};
use crate::error::{Error, Result};
use crate::expression::Expr;
use crate::tile::{Tile, TILE_SIZE};

/// Receives each tile as soon as it has been rendered.
///
/// The tile is only borrowed for the duration of the call.
pub trait TileObserver {
    fn observe(&mut self, tile: &Tile);
}

impl<F: FnMut(&Tile)> TileObserver for F {
    fn observe(&mut self, tile: &Tile) {
        self(tile)
    }
}

/// How tile samples are mapped to builtin coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileSampling {
    /// Every tile samples the unit square as if it were a full
    /// `TILE_SIZE x TILE_SIZE` raster, regardless of its placement or
    /// truncation. Matches how progressive previews have always rendered.
    #[default]
    PerTile,
    /// Samples are normalized by the full raster, like [`LineInterpreter`].
    /// Adjacent tiles then join up seamlessly.
    Raster,
}

/// Progress of the frame currently being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStatus {
    pub tile_count: usize,
    pub tile_index: usize,
    pub tiles_per_row: usize,
    pub res_x: usize,
    pub res_y: usize,
}

impl FrameStatus {
    fn new(res_x: usize, res_y: usize) -> Self {
        let tiles_per_row = res_x.div_ceil(TILE_SIZE);
        let tiles_per_col = res_y.div_ceil(TILE_SIZE);
        Self {
            tile_count: tiles_per_row * tiles_per_col,
            tile_index: 0,
            tiles_per_row,
            res_x,
            res_y,
        }
    }

    pub fn tiles_remaining(&self) -> usize {
        self.tile_count - self.tile_index
    }

    /// Offset and size of the next tile, in raster pixels.
    fn next_tile(&self) -> Tile {
        let col = self.tile_index % self.tiles_per_row;
        let row = self.tile_index / self.tiles_per_row;
        let x = col * TILE_SIZE;
        let y = row * TILE_SIZE;
        let w = (x + TILE_SIZE).min(self.res_x) - x;
        let h = (y + TILE_SIZE).min(self.res_y) - y;
        Tile::new(x, y, w, h)
    }
}

/// Renders terrain tile by tile, for progressive display.
pub struct TileInterpreter {
    res_x: usize,
    res_y: usize,
    sampling: TileSampling,
    observers: Vec<Box<dyn TileObserver>>,
    frame: Option<FrameStatus>,
    height_expr: Option<Evaluator<f32>>,
}

impl TileInterpreter {
    pub fn new() -> Self {
        Self {
            res_x: 0,
            res_y: 0,
            sampling: TileSampling::default(),
            observers: Vec::new(),
            frame: None,
            height_expr: None,
        }
    }

    pub fn add_tile_observer(&mut self, observer: impl TileObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// True once every tile of the current frame has been rendered, and
    /// always true when no frame is in progress.
    pub fn frame_is_done(&self) -> bool {
        self.tiles_remaining() == 0
    }

    /// Tiles left in the current frame, zero when idle.
    pub fn tiles_remaining(&self) -> usize {
        self.frame.as_ref().map_or(0, FrameStatus::tiles_remaining)
    }

    pub fn frame_status(&self) -> Option<&FrameStatus> {
        self.frame.as_ref()
    }

    /// Starts a frame at the current resolution.
    pub fn begin_frame(&mut self) -> Result<()> {
        if self.frame.is_some() {
            return Err(Error::FrameInProgress);
        }
        let frame = FrameStatus::new(self.res_x, self.res_y);
        debug!(
            width = frame.res_x,
            height = frame.res_y,
            tiles = frame.tile_count,
            "frame started"
        );
        self.frame = Some(frame);
        Ok(())
    }

    /// Renders the next tile and hands it to every observer.
    ///
    /// Exactly one tile is rendered per call, synchronously. `timeout` is
    /// accepted for event-loop callers but does not bound the work done.
    pub fn poll_tiles(&mut self, _timeout: Duration) -> Result<()> {
        let frame = self.frame.as_mut().ok_or(Error::NoFrame)?;
        let height_expr = self.height_expr.as_ref().ok_or(Error::MissingExpr("height"))?;
        if frame.tiles_remaining() == 0 {
            return Err(Error::FrameComplete);
        }

        let mut tile = frame.next_tile();
        render_tile(&mut tile, height_expr, self.sampling, frame.res_x, frame.res_y);
        frame.tile_index += 1;

        trace!(
            index = frame.tile_index - 1,
            x = tile.offset_x(),
            y = tile.offset_y(),
            width = tile.width(),
            height = tile.height(),
            "tile rendered"
        );

        for observer in &mut self.observers {
            observer.observe(&tile);
        }
        Ok(())
    }

    /// Ends the current frame, whether or not all tiles were rendered.
    pub fn end_frame(&mut self) -> Result<()> {
        let frame = self.frame.take().ok_or(Error::NoFrame)?;
        debug!(
            rendered = frame.tile_index,
            total = frame.tile_count,
            "frame ended"
        );
        Ok(())
    }

    /// Lowers `expr` as the height field.
    ///
    /// On failure the previous height expression stays active. Replacing the
    /// expression mid-frame is allowed but mixes two fields in one frame.
    pub fn set_height_expr(&mut self, expr: &Expr) -> Result<()> {
        match compile::<f32>(expr) {
            Ok(evaluator) => {
                self.height_expr = Some(evaluator);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, expr = %expr, "height expression rejected");
                Err(e)
            }
        }
    }

    pub fn has_height_expr(&self) -> bool {
        self.height_expr.is_some()
    }

    /// Sets the raster size used by the next [`TileInterpreter::begin_frame`].
    pub fn set_resolution(&mut self, width: usize, height: usize) {
        self.res_x = width;
        self.res_y = height;
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.res_x, self.res_y)
    }

    pub fn set_sampling(&mut self, sampling: TileSampling) {
        self.sampling = sampling;
    }

    pub fn sampling(&self) -> TileSampling {
        self.sampling
    }
}

impl Default for TileInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn render_tile(
    tile: &mut Tile,
    height_expr: &Evaluator<f32>,
    sampling: TileSampling,
    res_x: usize,
    res_y: usize,
) {
    let (width, offset_x, offset_y) = (tile.width(), tile.offset_x(), tile.offset_y());
    for (i, sample) in tile.samples_mut().iter_mut().enumerate() {
        let x = i % width;
        let y = i / width;
        let builtins = match sampling {
            TileSampling::PerTile => Builtins::at(x, y, TILE_SIZE, TILE_SIZE),
            TileSampling::Raster => Builtins::at(offset_x + x, offset_y + y, res_x, res_y),
        };
        *sample = [height_expr.eval(&builtins), 0.0, 0.0, 0.0];
    }
}

/// Receives one completed scanline at a time.
///
/// The row holds `width` groups of `[height, r, g, b]`, with color
/// channels already scaled to `[0, 255]`.
pub trait LineObserver {
    fn observe(&mut self, row: &[f32]);
}

impl<O: LineObserver + ?Sized> LineObserver for &mut O {
    fn observe(&mut self, row: &[f32]) {
        (**self).observe(row)
    }
}

/// Renders a whole raster row by row, for export.
pub struct LineInterpreter<O> {
    width: usize,
    height: usize,
    observer: O,
    height_expr: Option<Evaluator<f32>>,
    color_expr: Option<Evaluator<Float3>>,
}

impl<O: LineObserver> LineInterpreter<O> {
    pub fn new(width: usize, height: usize, observer: O) -> Self {
        Self {
            width,
            height,
            observer,
            height_expr: None,
            color_expr: None,
        }
    }

    /// Lowers `expr` as the height field; keeps the previous one on failure.
    pub fn set_height_expr(&mut self, expr: &Expr) -> Result<()> {
        let evaluator = compile::<f32>(expr).inspect_err(|e| {
            warn!(error = %e, expr = %expr, "height expression rejected");
        })?;
        self.height_expr = Some(evaluator);
        Ok(())
    }

    /// Lowers `expr` as the `vec3` color field; keeps the previous one on failure.
    pub fn set_color_expr(&mut self, expr: &Expr) -> Result<()> {
        let evaluator = compile::<Float3>(expr).inspect_err(|e| {
            warn!(error = %e, expr = %expr, "color expression rejected");
        })?;
        self.color_expr = Some(evaluator);
        Ok(())
    }

    /// Evaluates every row and pushes it to the observer before moving on.
    pub fn execute(&mut self) -> Result<()> {
        let height_expr = self.height_expr.as_ref().ok_or(Error::MissingExpr("height"))?;
        let color_expr = self.color_expr.as_ref().ok_or(Error::MissingExpr("color"))?;

        debug!(width = self.width, height = self.height, "scanline render started");

        let mut row = vec![0.0f32; self.width * 4];
        for y in 0..self.height {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let builtins = Builtins::at(x, y, self.width, self.height);
                let h = height_expr.eval(&builtins);
                let [r, g, b] = color_expr.eval(&builtins);
                px[0] = h;
                px[1] = (r * 255.0).clamp(0.0, 255.0);
                px[2] = (g * 255.0).clamp(0.0, 255.0);
                px[3] = (b * 255.0).clamp(0.0, 255.0);
            }
            self.observer.observe(&row);
        }

        debug!(rows = self.height, "scanline render finished");
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Copy of what a tile observer saw.
    #[derive(Debug, Clone)]
    struct SeenTile {
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        heights: Vec<f32>,
    }

    fn recording(interp: &mut TileInterpreter) -> Rc<RefCell<Vec<SeenTile>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        interp.add_tile_observer(move |tile: &Tile| {
            sink.borrow_mut().push(SeenTile {
                x: tile.offset_x(),
                y: tile.offset_y(),
                w: tile.width(),
                h: tile.height(),
                heights: tile.samples().iter().map(|s| s[0]).collect(),
            });
        });
        seen
    }

    fn render_all(interp: &mut TileInterpreter) -> usize {
        let mut polls = 0;
        while !interp.frame_is_done() {
            interp.poll_tiles(Duration::ZERO).unwrap();
            polls += 1;
        }
        polls
    }

    #[test]
    fn test_idle_queries() {
        let interp = TileInterpreter::new();
        assert!(interp.frame_is_done());
        assert_eq!(interp.tiles_remaining(), 0);
        assert!(interp.frame_status().is_none());
    }

    #[test]
    fn test_sequencing_errors() {
        let mut interp = TileInterpreter::new();
        interp.set_resolution(10, 10);
        assert_eq!(interp.poll_tiles(Duration::ZERO), Err(Error::NoFrame));
        assert_eq!(interp.end_frame(), Err(Error::NoFrame));

        interp.begin_frame().unwrap();
        assert_eq!(interp.begin_frame(), Err(Error::FrameInProgress));
        assert_eq!(interp.poll_tiles(Duration::ZERO), Err(Error::MissingExpr("height")));
        interp.end_frame().unwrap();
        assert_eq!(interp.end_frame(), Err(Error::NoFrame));
    }

    #[test]
    fn test_tile_grid_300() {
        let mut interp = TileInterpreter::new();
        let seen = recording(&mut interp);
        interp.set_height_expr(&Expr::literal(0.0f32)).unwrap();
        interp.set_resolution(300, 300);
        interp.begin_frame().unwrap();
        assert_eq!(interp.tiles_remaining(), 4);

        assert_eq!(render_all(&mut interp), 4);
        assert_eq!(interp.tiles_remaining(), 0);
        assert_eq!(interp.poll_tiles(Duration::ZERO), Err(Error::FrameComplete));

        let rects: Vec<_> = seen.borrow().iter().map(|t| (t.x, t.y, t.w, t.h)).collect();
        assert_eq!(
            rects,
            vec![(0, 0, 256, 256), (256, 0, 44, 256), (0, 256, 256, 44), (256, 256, 44, 44)]
        );
        interp.end_frame().unwrap();
    }

    #[test]
    fn test_poll_count_matches_grid() {
        for &(w, h) in &[(1, 1), (256, 256), (257, 1), (513, 700), (1024, 1024)] {
            let mut interp = TileInterpreter::new();
            interp.set_height_expr(&Expr::center_u()).unwrap();
            interp.set_resolution(w, h);
            interp.begin_frame().unwrap();
            let expected = w.div_ceil(TILE_SIZE) * h.div_ceil(TILE_SIZE);
            assert_eq!(render_all(&mut interp), expected);
            assert!(interp.poll_tiles(Duration::ZERO).is_err());
        }
    }

    #[test]
    fn test_constant_height() {
        let mut interp = TileInterpreter::new();
        let seen = recording(&mut interp);
        interp.set_height_expr(&Expr::literal(0.75f32)).unwrap();
        interp.set_resolution(300, 20);
        interp.begin_frame().unwrap();
        render_all(&mut interp);

        for tile in seen.borrow().iter() {
            assert_eq!(tile.heights.len(), tile.w * tile.h);
            assert!(tile.heights.iter().all(|&h| h == 0.75));
        }
    }

    #[test]
    fn test_per_tile_sampling_ignores_placement() {
        let mut interp = TileInterpreter::new();
        let seen = recording(&mut interp);
        interp.set_height_expr(&Expr::center_u()).unwrap();
        interp.set_resolution(300, 1);
        interp.begin_frame().unwrap();
        render_all(&mut interp);

        let seen = seen.borrow();
        // The 44-wide edge tile samples the same u values as the first 44 of a full tile
        for x in 0..44 {
            let expected = (x as f32 + 0.5) / TILE_SIZE as f32;
            assert_eq!(seen[0].heights[x], expected);
            assert_eq!(seen[1].heights[x], expected);
        }
    }

    #[test]
    fn test_raster_sampling_uses_full_raster() {
        let mut interp = TileInterpreter::new();
        let seen = recording(&mut interp);
        interp.set_sampling(TileSampling::Raster);
        interp.set_height_expr(&Expr::center_u()).unwrap();
        interp.set_resolution(300, 2);
        interp.begin_frame().unwrap();
        render_all(&mut interp);

        let seen = seen.borrow();
        assert_eq!(seen[1].heights[0], 256.5 / 300.0);
        assert_eq!(seen[1].heights[43], 299.5 / 300.0);
        // Second row of the edge tile starts after 44 samples
        assert_eq!(seen[1].heights[44], 256.5 / 300.0);
    }

    #[test]
    fn test_resolution_applies_to_next_frame() {
        let mut interp = TileInterpreter::new();
        interp.set_height_expr(&Expr::center_v()).unwrap();
        interp.set_resolution(256, 256);
        interp.begin_frame().unwrap();
        interp.set_resolution(1024, 1024);
        assert_eq!(interp.tiles_remaining(), 1);
        render_all(&mut interp);
        interp.end_frame().unwrap();

        interp.begin_frame().unwrap();
        assert_eq!(interp.tiles_remaining(), 16);
    }

    #[test]
    fn test_end_frame_abandons_progress() {
        let mut interp = TileInterpreter::new();
        let seen = recording(&mut interp);
        interp.set_height_expr(&Expr::center_u()).unwrap();
        interp.set_resolution(600, 600);
        interp.begin_frame().unwrap();
        interp.poll_tiles(Duration::from_millis(5)).unwrap();
        interp.poll_tiles(Duration::from_millis(5)).unwrap();
        assert_eq!(interp.tiles_remaining(), 7);
        interp.end_frame().unwrap();
        assert!(interp.frame_is_done());

        interp.begin_frame().unwrap();
        assert_eq!(interp.frame_status().map(|f| f.tile_index), Some(0));
        interp.poll_tiles(Duration::ZERO).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!((seen[2].x, seen[2].y), (0, 0));
    }

    #[test]
    fn test_failed_height_expr_keeps_previous() {
        let mut interp = TileInterpreter::new();
        let seen = recording(&mut interp);
        interp.set_height_expr(&Expr::literal(2.0f32)).unwrap();
        let bad = Expr::vec3([Expr::center_u(), Expr::literal(1), Expr::center_v()]);
        assert!(interp.set_height_expr(&bad).is_err());
        assert!(interp.set_height_expr(&Expr::literal(1)).is_err());
        assert!(interp.has_height_expr());

        interp.set_resolution(4, 4);
        interp.begin_frame().unwrap();
        render_all(&mut interp);
        assert!(seen.borrow()[0].heights.iter().all(|&h| h == 2.0));
    }

    #[test]
    fn test_every_observer_is_notified() {
        let mut interp = TileInterpreter::new();
        let a = recording(&mut interp);
        let b = recording(&mut interp);
        interp.set_height_expr(&Expr::center_u()).unwrap();
        interp.set_resolution(512, 256);
        interp.begin_frame().unwrap();
        render_all(&mut interp);
        assert_eq!(a.borrow().len(), 2);
        assert_eq!(b.borrow().len(), 2);
    }

    #[test]
    fn test_zero_resolution_frame_is_immediately_done() {
        let mut interp = TileInterpreter::new();
        interp.set_height_expr(&Expr::center_u()).unwrap();
        interp.begin_frame().unwrap();
        assert!(interp.frame_is_done());
        assert_eq!(interp.poll_tiles(Duration::ZERO), Err(Error::FrameComplete));
        interp.end_frame().unwrap();
    }

    #[derive(Default)]
    struct Rows(Vec<Vec<f32>>);

    impl LineObserver for Rows {
        fn observe(&mut self, row: &[f32]) {
            self.0.push(row.to_vec());
        }
    }

    fn uv_color() -> crate::expression::ExprRef {
        Expr::vec3([Expr::center_u(), Expr::center_v(), Expr::literal(1.0f32)])
    }

    #[test]
    fn test_line_render_4x4() {
        let mut interp = LineInterpreter::new(4, 4, Rows::default());
        interp.set_height_expr(&Expr::center_u()).unwrap();
        interp.set_color_expr(&uv_color()).unwrap();
        interp.execute().unwrap();

        let rows = interp.into_observer().0;
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.len() == 16));

        let heights: Vec<f32> = rows[0].chunks(4).map(|p| p[0]).collect();
        assert_eq!(heights, vec![0.125, 0.375, 0.625, 0.875]);

        let colors: Vec<(u8, u8, u8)> = rows[0]
            .chunks(4)
            .map(|p| (p[1] as u8, p[2] as u8, p[3] as u8))
            .collect();
        // v is 0.125 across row 0, so green stays at 31
        assert_eq!(colors, vec![(31, 31, 255), (95, 31, 255), (159, 31, 255), (223, 31, 255)]);

        let greens: Vec<u8> = rows.iter().map(|r| r[2] as u8).collect();
        assert_eq!(greens, vec![31, 95, 159, 223]);

        // Heights depend only on x
        for row in &rows {
            let h: Vec<f32> = row.chunks(4).map(|p| p[0]).collect();
            assert_eq!(h, heights);
        }
    }

    #[test]
    fn test_line_render_center_v() {
        let mut rows = Rows::default();
        {
            let mut interp = LineInterpreter::new(3, 5, &mut rows);
            interp.set_height_expr(&Expr::center_v()).unwrap();
            interp.set_color_expr(&uv_color()).unwrap();
            interp.execute().unwrap();
        }
        assert_eq!(rows.0.len(), 5);

        for (y, row) in rows.0.iter().enumerate() {
            let expected = (y as f32 + 0.5) / 5.0;
            assert!(row.chunks(4).all(|p| p[0] == expected));
        }
    }

    #[test]
    fn test_line_render_requires_both_exprs() {
        let mut interp = LineInterpreter::new(2, 2, Rows::default());
        assert_eq!(interp.execute(), Err(Error::MissingExpr("height")));
        interp.set_height_expr(&Expr::center_u()).unwrap();
        assert_eq!(interp.execute(), Err(Error::MissingExpr("color")));
        assert!(interp.observer().0.is_empty());
    }

    #[test]
    fn test_line_color_is_clamped() {
        let mut interp = LineInterpreter::new(1, 1, Rows::default());
        interp.set_height_expr(&Expr::literal(0.0f32)).unwrap();
        interp
            .set_color_expr(&Expr::vec3([
                Expr::literal(2.0f32),
                Expr::literal(-1.0f32),
                Expr::literal(0.5f32),
            ]))
            .unwrap();
        interp.execute().unwrap();
        assert_eq!(interp.observer().0[0], vec![0.0, 255.0, 0.0, 127.5]);
    }

    #[test]
    fn test_line_failed_exprs_keep_previous() {
        let mut interp = LineInterpreter::new(2, 1, Rows::default());
        interp.set_height_expr(&Expr::literal(3.0f32)).unwrap();
        interp.set_color_expr(&uv_color()).unwrap();
        assert!(interp.set_height_expr(&uv_color()).is_err());
        assert!(interp.set_color_expr(&Expr::center_u()).is_err());
        interp.execute().unwrap();
        let row = &interp.observer().0[0];
        assert_eq!(row[0], 3.0);
        assert_eq!(row[3], 255.0);
    }

    #[test]
    fn test_line_nan_propagates() {
        let mut interp = LineInterpreter::new(2, 1, Rows::default());
        let zero = Expr::literal(0.0f32);
        interp.set_height_expr(&Expr::div(zero.clone(), zero)).unwrap();
        interp.set_color_expr(&uv_color()).unwrap();
        interp.execute().unwrap();
        assert!(interp.observer().0[0][0].is_nan());
    }
}
