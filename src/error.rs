#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] terra_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("png encoding failed: {0}")]
    Png(#[from] png::EncodingError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid project file: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid height range: min {min} must be below max {max}")]
    InvalidHeightRange { min: f32, max: f32 },

    #[error("row length mismatch: expected {expected} values, got {actual}")]
    RowLength { expected: usize, actual: usize },

    #[error("render cancelled after {rendered} of {total} tiles")]
    Cancelled { rendered: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
