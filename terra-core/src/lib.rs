//! Terrain expressions and the interpreters that render them
//!
//! Architecture:
//! 1. `types` - Value kinds and the literal-to-kind mapping
//! 2. `expression` - Immutable, shareable expression IR
//! 3. `compiler` - Lowers IR into closures specialized for one value kind
//! 4. `tile` - Fixed-size tiles of height/color samples
//! 5. `interpreter` - Tiled (progressive) and scanline (streaming) renderers
//!
//! Also includes:
//! - `backend` - Whole-raster evaluator used by interactive editors

mod types;
mod expression;
mod compiler;
mod tile;
pub mod interpreter;
pub mod backend;
pub mod error;

pub use types::{Type, TypeMap};
pub use expression::{BinOp, Expr, ExprRef, ExprVisitor, LiteralValue, UnaryOp, VarId};
pub use compiler::{compile, Builtins, Evaluator, Float2, Float3, Float4, Lower};
pub use tile::{Sample, Tile, SAMPLES_PER_TILE, TILE_SIZE};
pub use interpreter::{
    FrameStatus, LineInterpreter, LineObserver, TileInterpreter, TileObserver, TileSampling,
};
pub use backend::{CpuBackend, HeightMapObserver};
pub use error::{Error, Result};
