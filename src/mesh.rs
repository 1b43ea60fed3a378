//! Vertex and index data for drawing a rendered tile as a height field

use terra_core::{Tile, TILE_SIZE};

use crate::error::Result;

// A full tile is addressable with 16-bit indices.
const _: () = assert!(TILE_SIZE * TILE_SIZE <= u16::MAX as usize + 1);

/// Geometry for one tile.
///
/// `vertices` holds every position `(u, v, height)` followed by one normal
/// per quad; `indices` address the positions only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileMesh {
    pub offset_x: usize,
    pub offset_y: usize,
    pub vertices: Vec<f32>,
    pub position_count: usize,
    pub normal_count: usize,
    pub indices: Vec<u16>,
}

impl TileMesh {
    pub fn from_tile(tile: &Tile) -> Result<Self> {
        let position_len = tile.position_buffer_len();
        let normal_len = tile.normal_buffer_len();

        let mut vertices = vec![0.0; position_len + normal_len];
        let (positions, normals) = vertices.split_at_mut(position_len);
        tile.to_position_buffer(positions)?;
        tile.to_normal_buffer(normals)?;

        Ok(Self {
            offset_x: tile.offset_x(),
            offset_y: tile.offset_y(),
            vertices,
            position_count: position_len / 3,
            normal_count: normal_len / 3,
            indices: quad_indices(tile.width(), tile.height()),
        })
    }

    pub fn positions(&self) -> &[f32] {
        &self.vertices[..self.position_count * 3]
    }

    pub fn normals(&self) -> &[f32] {
        &self.vertices[self.position_count * 3..]
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Two triangles per quad, wound `(x,y) (x,y+1) (x+1,y)` then
/// `(x,y+1) (x+1,y+1) (x+1,y)`.
fn quad_indices(width: usize, height: usize) -> Vec<u16> {
    let quads = width.saturating_sub(1) * height.saturating_sub(1);
    let mut indices = Vec::with_capacity(quads * 6);
    let at = |x: usize, y: usize| (y * width + x) as u16;

    for y in 0..height.saturating_sub(1) {
        for x in 0..width.saturating_sub(1) {
            let (a, b, c, d) = (at(x, y), at(x, y + 1), at(x + 1, y), at(x + 1, y + 1));
            indices.extend_from_slice(&[a, b, c, b, d, c]);
        }
    }
    indices
}
