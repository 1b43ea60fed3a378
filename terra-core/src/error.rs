use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expression of type {} does not lower to {target}", display_type(.found))]
    Lowering { target: Type, found: Option<Type> },

    #[error("a frame is already being rendered")]
    FrameInProgress,

    #[error("no frame is being rendered")]
    NoFrame,

    #[error("all tiles of the current frame have been rendered")]
    FrameComplete,

    #[error("no {0} expression has been set")]
    MissingExpr(&'static str),

    #[error("buffer size mismatch: expected {expected} elements, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}

fn display_type(ty: &Option<Type>) -> String {
    match ty {
        Some(ty) => ty.to_string(),
        None => "<untyped>".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
