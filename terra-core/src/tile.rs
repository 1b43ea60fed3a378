//! Fixed-size tile of interleaved height and color samples
//!
//! A tile covers at most `TILE_SIZE x TILE_SIZE` pixels of a larger raster.
//! Tiles on the right and bottom edges may be narrower. Samples are packed
//! row-major with a stride of the tile's own width.

use crate::error::{Error, Result};

/// Edge length of a tile in samples
pub const TILE_SIZE: usize = 256;
/// Number of samples a tile can hold
pub const SAMPLES_PER_TILE: usize = TILE_SIZE * TILE_SIZE;

/// One sample: height followed by red, green, blue.
pub type Sample = [f32; 4];

pub struct Tile {
    buffer: Box<[Sample]>,
    offset_x: usize,
    offset_y: usize,
    width: usize,
    height: usize,
}

impl Tile {
    pub fn new(offset_x: usize, offset_y: usize, width: usize, height: usize) -> Self {
        debug_assert!(width <= TILE_SIZE && height <= TILE_SIZE);
        Self {
            buffer: vec![[0.0; 4]; SAMPLES_PER_TILE].into_boxed_slice(),
            offset_x,
            offset_y,
            width,
            height,
        }
    }

    pub fn offset_x(&self) -> usize {
        self.offset_x
    }

    pub fn offset_y(&self) -> usize {
        self.offset_y
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Samples covered by this tile, row-major.
    pub fn samples(&self) -> &[Sample] {
        &self.buffer[..self.width * self.height]
    }

    pub fn samples_mut(&mut self) -> &mut [Sample] {
        let len = self.width * self.height;
        &mut self.buffer[..len]
    }

    /// One row of samples.
    pub fn line(&self, y: usize) -> &[Sample] {
        let start = y * self.width;
        &self.buffer[start..start + self.width]
    }

    #[inline]
    pub fn height_at(&self, x: usize, y: usize) -> f32 {
        self.buffer[y * self.width + x][0]
    }

    /// Element count expected by [`Tile::to_position_buffer`].
    pub fn position_buffer_len(&self) -> usize {
        self.width * self.height * 3
    }

    /// Element count expected by [`Tile::to_normal_buffer`].
    pub fn normal_buffer_len(&self) -> usize {
        self.width.saturating_sub(1) * self.height.saturating_sub(1) * 3
    }

    /// Writes `(u, v, height)` per sample, with `u` and `v` normalized to the tile.
    pub fn to_position_buffer(&self, buffer: &mut [f32]) -> Result<()> {
        let expected = self.position_buffer_len();
        if buffer.len() != expected {
            return Err(Error::BufferSize { expected, actual: buffer.len() });
        }

        for y in 0..self.height {
            for x in 0..self.width {
                let i = (y * self.width + x) * 3;
                buffer[i] = (x as f32 + 0.5) / self.width as f32;
                buffer[i + 1] = (y as f32 + 0.5) / self.height as f32;
                buffer[i + 2] = self.height_at(x, y);
            }
        }
        Ok(())
    }

    /// Writes one unnormalized normal per quad.
    ///
    /// Uses forward differences along x and y. With constant spacing the
    /// cross product reduces to `(dy * dh_x, dx * dh_y, -dx * dy)`, which is
    /// proportional to `(dh/dx, dh/dy, -1)`.
    pub fn to_normal_buffer(&self, buffer: &mut [f32]) -> Result<()> {
        let expected = self.normal_buffer_len();
        if buffer.len() != expected {
            return Err(Error::BufferSize { expected, actual: buffer.len() });
        }
        if expected == 0 {
            return Ok(());
        }

        let dx = 1.0 / self.width as f32;
        let dy = 1.0 / self.height as f32;
        let quads_per_row = self.width - 1;

        for y in 0..self.height - 1 {
            for x in 0..quads_per_row {
                let i = (y * quads_per_row + x) * 3;
                let h1 = self.height_at(x, y);
                let h2 = self.height_at(x + 1, y);
                let h3 = self.height_at(x, y + 1);
                buffer[i] = dy * (h2 - h1);
                buffer[i + 1] = dx * (h3 - h1);
                buffer[i + 2] = -(dx * dy);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("offset_x", &self.offset_x)
            .field("offset_y", &self.offset_y)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
