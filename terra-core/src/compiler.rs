//! Expression lowering
//!
//! Lowers an IR tree into a closure tree specialized for one target kind.
//! All type checking happens here, once; the resulting [`Evaluator`] runs
//! per sample without inspecting types again.

use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::expression::{Expr, VarId};
use crate::types::Type;

pub type Float2 = [f32; 2];
pub type Float3 = [f32; 3];
pub type Float4 = [f32; 4];

/// Builtin coordinates of one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Builtins {
    pub center_u: f32,
    pub center_v: f32,
}

impl Builtins {
    pub fn new(center_u: f32, center_v: f32) -> Self {
        Self { center_u, center_v }
    }

    /// Center of pixel `(x, y)` in a `width x height` grid, normalized to `[0, 1)`.
    #[inline]
    pub fn at(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            center_u: (x as f32 + 0.5) / width as f32,
            center_v: (y as f32 + 0.5) / height as f32,
        }
    }

    #[inline]
    pub fn get(&self, id: VarId) -> f32 {
        match id {
            VarId::CenterU => self.center_u,
            VarId::CenterV => self.center_v,
        }
    }
}

type EvalFn<T> = dyn Fn(&Builtins) -> T + Send + Sync;

/// Lowered expression producing a `T` per sample.
pub struct Evaluator<T> {
    f: Box<EvalFn<T>>,
}

impl<T> Evaluator<T> {
    fn new(f: impl Fn(&Builtins) -> T + Send + Sync + 'static) -> Self {
        Self { f: Box::new(f) }
    }

    #[inline]
    pub fn eval(&self, builtins: &Builtins) -> T {
        (self.f)(builtins)
    }
}

impl<T: Copy + Send + Sync + 'static> Evaluator<T> {
    pub fn constant(value: T) -> Self {
        Self::new(move |_| value)
    }
}

impl<T> fmt::Debug for Evaluator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("output", &std::any::type_name::<T>())
            .finish()
    }
}

/// Target kinds an expression can be lowered to.
///
/// `lower` returns `None` when the tree does not produce this kind; a
/// mismatch anywhere below the root fails the whole tree.
pub trait Lower: Sized + 'static {
    const TARGET: Type;

    fn lower(expr: &Expr) -> Option<Evaluator<Self>>;
}

impl Lower for f32 {
    const TARGET: Type = Type::Float;

    fn lower(expr: &Expr) -> Option<Evaluator<f32>> {
        match expr {
            Expr::VarRef(VarId::CenterU) => Some(Evaluator::new(|b| b.center_u)),
            Expr::VarRef(VarId::CenterV) => Some(Evaluator::new(|b| b.center_v)),
            Expr::FloatLiteral(value) => Some(Evaluator::constant(*value)),
            Expr::IntToFloat(source) => {
                let source = i32::lower(source)?;
                Some(Evaluator::new(move |b| source.eval(b) as f32))
            }
            Expr::Unary(op, input) => {
                let (op, input) = (*op, f32::lower(input)?);
                Some(Evaluator::new(move |b| op.apply(input.eval(b))))
            }
            Expr::Binary(op, left, right) => {
                let (op, l, r) = (*op, f32::lower(left)?, f32::lower(right)?);
                Some(Evaluator::new(move |b| op.apply(l.eval(b), r.eval(b))))
            }
            Expr::IntLiteral(_)
            | Expr::FloatToInt(_)
            | Expr::Vec2(_)
            | Expr::Vec3(_)
            | Expr::Vec4(_) => None,
        }
    }
}

impl Lower for i32 {
    const TARGET: Type = Type::Int;

    fn lower(expr: &Expr) -> Option<Evaluator<i32>> {
        match expr {
            Expr::IntLiteral(value) => Some(Evaluator::constant(*value)),
            Expr::FloatToInt(source) => {
                let source = f32::lower(source)?;
                // `as` truncates toward zero and saturates; NaN becomes 0
                Some(Evaluator::new(move |b| source.eval(b) as i32))
            }
            Expr::VarRef(_)
            | Expr::FloatLiteral(_)
            | Expr::IntToFloat(_)
            | Expr::Unary(..)
            | Expr::Binary(..)
            | Expr::Vec2(_)
            | Expr::Vec3(_)
            | Expr::Vec4(_) => None,
        }
    }
}

macro_rules! impl_lower_vector {
    ($n:literal, $variant:ident) => {
        impl Lower for [f32; $n] {
            const TARGET: Type = Type::$variant;

            fn lower(expr: &Expr) -> Option<Evaluator<Self>> {
                let Expr::$variant(elements) = expr else {
                    return None;
                };
                let elements = elements
                    .iter()
                    .map(|e| f32::lower(e))
                    .collect::<Option<Vec<_>>>()?;
                Some(Evaluator::new(move |b| {
                    std::array::from_fn(|i| elements[i].eval(b))
                }))
            }
        }
    };
}

impl_lower_vector!(2, Vec2);
impl_lower_vector!(3, Vec3);
impl_lower_vector!(4, Vec4);

/// Lower `expr` to an evaluator producing `T`.
pub fn compile<T: Lower>(expr: &Expr) -> Result<Evaluator<T>> {
    match T::lower(expr) {
        Some(evaluator) => {
            debug!(target_type = %T::TARGET, expr = %expr, "lowered expression");
            Ok(evaluator)
        }
        None => Err(Error::Lowering {
            target: T::TARGET,
            found: expr.get_type(),
        }),
    }
}
