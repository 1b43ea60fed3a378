//! Terrain expression IR
//!
//! Trees are built programmatically by callers and shared through [`ExprRef`].
//! Nodes carry no mutable state, so subtrees may be reused freely.

use std::fmt;
use std::sync::Arc;

use crate::types::{Type, TypeMap};

/// Shared handle to an immutable expression node.
pub type ExprRef = Arc<Expr>;

/// Builtin per-sample coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarId {
    /// Horizontal coordinate of the sample center, normalized to `[0, 1)`.
    CenterU,
    /// Vertical coordinate of the sample center, normalized to `[0, 1)`.
    CenterV,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Sine,
    Cosine,
    Tangent,
    Arcsine,
    Arccosine,
    Arctangent,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Sine => "sin",
            UnaryOp::Cosine => "cos",
            UnaryOp::Tangent => "tan",
            UnaryOp::Arcsine => "asin",
            UnaryOp::Arccosine => "acos",
            UnaryOp::Arctangent => "atan",
        }
    }

    /// Apply the operation to a value in radians.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            UnaryOp::Sine => x.sin(),
            UnaryOp::Cosine => x.cos(),
            UnaryOp::Tangent => x.tan(),
            UnaryOp::Arcsine => x.asin(),
            UnaryOp::Arccosine => x.acos(),
            UnaryOp::Arctangent => x.atan(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }

    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
        }
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Builtin coordinate reference
    VarRef(VarId),
    /// Integer constant
    IntLiteral(i32),
    /// Float constant
    FloatLiteral(f32),
    /// Promote an int expression to float
    IntToFloat(ExprRef),
    /// Truncate a float expression toward zero
    FloatToInt(ExprRef),
    /// Trigonometric function of a float expression
    Unary(UnaryOp, ExprRef),
    /// Float arithmetic
    Binary(BinOp, ExprRef, ExprRef),
    /// Combine float expressions into a vector
    Vec2([ExprRef; 2]),
    Vec3([ExprRef; 3]),
    Vec4([ExprRef; 4]),
}

/// Native types that can appear as literals.
pub trait LiteralValue: TypeMap {
    fn into_expr(self) -> Expr;
}

impl LiteralValue for i32 {
    fn into_expr(self) -> Expr {
        Expr::IntLiteral(self)
    }
}

impl LiteralValue for f32 {
    fn into_expr(self) -> Expr {
        Expr::FloatLiteral(self)
    }
}

impl Expr {
    pub fn var(id: VarId) -> ExprRef {
        Arc::new(Expr::VarRef(id))
    }

    pub fn center_u() -> ExprRef {
        Self::var(VarId::CenterU)
    }

    pub fn center_v() -> ExprRef {
        Self::var(VarId::CenterV)
    }

    pub fn literal<T: LiteralValue>(value: T) -> ExprRef {
        Arc::new(value.into_expr())
    }

    pub fn int_to_float(source: ExprRef) -> ExprRef {
        Arc::new(Expr::IntToFloat(source))
    }

    pub fn float_to_int(source: ExprRef) -> ExprRef {
        Arc::new(Expr::FloatToInt(source))
    }

    pub fn unary(op: UnaryOp, input: ExprRef) -> ExprRef {
        Arc::new(Expr::Unary(op, input))
    }

    pub fn sin(input: ExprRef) -> ExprRef {
        Self::unary(UnaryOp::Sine, input)
    }

    pub fn cos(input: ExprRef) -> ExprRef {
        Self::unary(UnaryOp::Cosine, input)
    }

    pub fn binary(op: BinOp, left: ExprRef, right: ExprRef) -> ExprRef {
        Arc::new(Expr::Binary(op, left, right))
    }

    pub fn add(left: ExprRef, right: ExprRef) -> ExprRef {
        Self::binary(BinOp::Add, left, right)
    }

    pub fn sub(left: ExprRef, right: ExprRef) -> ExprRef {
        Self::binary(BinOp::Sub, left, right)
    }

    pub fn mul(left: ExprRef, right: ExprRef) -> ExprRef {
        Self::binary(BinOp::Mul, left, right)
    }

    pub fn div(left: ExprRef, right: ExprRef) -> ExprRef {
        Self::binary(BinOp::Div, left, right)
    }

    pub fn vec2(elements: [ExprRef; 2]) -> ExprRef {
        Arc::new(Expr::Vec2(elements))
    }

    pub fn vec3(elements: [ExprRef; 3]) -> ExprRef {
        Arc::new(Expr::Vec3(elements))
    }

    pub fn vec4(elements: [ExprRef; 4]) -> ExprRef {
        Arc::new(Expr::Vec4(elements))
    }

    /// Elements of a vector combiner, or `None` for any other node.
    pub fn elements(&self) -> Option<&[ExprRef]> {
        match self {
            Expr::Vec2(e) => Some(e),
            Expr::Vec3(e) => Some(e),
            Expr::Vec4(e) => Some(e),
            _ => None,
        }
    }

    /// Static type of this node, or `None` if it is ill-typed.
    ///
    /// Casts report their target kind even when their source does not
    /// type-check; that mismatch only shows up during lowering.
    pub fn get_type(&self) -> Option<Type> {
        match self {
            Expr::VarRef(_) => Some(Type::Float),
            Expr::IntLiteral(_) => Some(Type::Int),
            Expr::FloatLiteral(_) => Some(Type::Float),
            Expr::IntToFloat(_) => Some(Type::Float),
            Expr::FloatToInt(_) => Some(Type::Int),
            Expr::Unary(..) => Some(Type::Float),
            Expr::Binary(_, left, right) => {
                if left.get_type() == Some(Type::Float) && right.get_type() == Some(Type::Float) {
                    Some(Type::Float)
                } else {
                    None
                }
            }
            Expr::Vec2(_) | Expr::Vec3(_) | Expr::Vec4(_) => {
                let elements = self.elements()?;
                if elements.iter().all(|e| e.get_type() == Some(Type::Float)) {
                    Type::vector(elements.len())
                } else {
                    None
                }
            }
        }
    }

    /// Dispatch this node to the matching visitor method.
    pub fn accept<V: ExprVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Expr::VarRef(id) => visitor.visit_var_ref(*id),
            Expr::IntLiteral(value) => visitor.visit_int_literal(*value),
            Expr::FloatLiteral(value) => visitor.visit_float_literal(*value),
            Expr::IntToFloat(source) => visitor.visit_int_to_float(source),
            Expr::FloatToInt(source) => visitor.visit_float_to_int(source),
            Expr::Unary(op, input) => visitor.visit_unary(*op, input),
            Expr::Binary(op, left, right) => visitor.visit_binary(*op, left, right),
            Expr::Vec2(e) => visitor.visit_vector(e),
            Expr::Vec3(e) => visitor.visit_vector(e),
            Expr::Vec4(e) => visitor.visit_vector(e),
        }
    }
}

/// Per-variant callbacks for walking an expression tree.
pub trait ExprVisitor {
    type Output;

    fn visit_var_ref(&mut self, id: VarId) -> Self::Output;
    fn visit_int_literal(&mut self, value: i32) -> Self::Output;
    fn visit_float_literal(&mut self, value: f32) -> Self::Output;
    fn visit_int_to_float(&mut self, source: &Expr) -> Self::Output;
    fn visit_float_to_int(&mut self, source: &Expr) -> Self::Output;
    fn visit_unary(&mut self, op: UnaryOp, input: &Expr) -> Self::Output;
    fn visit_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Self::Output;
    fn visit_vector(&mut self, elements: &[ExprRef]) -> Self::Output;
}

/// Writes an expression in a compact function-call notation.
struct Printer<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
}

impl ExprVisitor for Printer<'_, '_> {
    type Output = fmt::Result;

    fn visit_var_ref(&mut self, id: VarId) -> fmt::Result {
        match id {
            VarId::CenterU => self.f.write_str("u"),
            VarId::CenterV => self.f.write_str("v"),
        }
    }

    fn visit_int_literal(&mut self, value: i32) -> fmt::Result {
        write!(self.f, "{}", value)
    }

    fn visit_float_literal(&mut self, value: f32) -> fmt::Result {
        write!(self.f, "{:?}", value)
    }

    fn visit_int_to_float(&mut self, source: &Expr) -> fmt::Result {
        self.f.write_str("float(")?;
        source.accept(self)?;
        self.f.write_str(")")
    }

    fn visit_float_to_int(&mut self, source: &Expr) -> fmt::Result {
        self.f.write_str("int(")?;
        source.accept(self)?;
        self.f.write_str(")")
    }

    fn visit_unary(&mut self, op: UnaryOp, input: &Expr) -> fmt::Result {
        write!(self.f, "{}(", op.name())?;
        input.accept(self)?;
        self.f.write_str(")")
    }

    fn visit_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> fmt::Result {
        self.f.write_str("(")?;
        left.accept(self)?;
        write!(self.f, " {} ", op.symbol())?;
        right.accept(self)?;
        self.f.write_str(")")
    }

    fn visit_vector(&mut self, elements: &[ExprRef]) -> fmt::Result {
        write!(self.f, "vec{}(", elements.len())?;
        for (i, element) in elements.iter().enumerate() {
            if i > 0 {
                self.f.write_str(", ")?;
            }
            element.accept(self)?;
        }
        self.f.write_str(")")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.accept(&mut Printer { f })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_types() {
        assert_eq!(Expr::center_u().get_type(), Some(Type::Float));
        assert_eq!(Expr::literal(3).get_type(), Some(Type::Int));
        assert_eq!(Expr::literal(3.0f32).get_type(), Some(Type::Float));
        assert_eq!(Expr::sin(Expr::literal(1)).get_type(), Some(Type::Float));
    }

    #[test]
    fn test_cast_type_ignores_source() {
        // int(float-literal) is fine, int(int-literal) is ill-typed but still reports int
        let bad = Expr::float_to_int(Expr::literal(1));
        assert_eq!(bad.get_type(), Some(Type::Int));
        let bad = Expr::int_to_float(Expr::center_u());
        assert_eq!(bad.get_type(), Some(Type::Float));
    }

    #[test]
    fn test_vector_combiner_type() {
        let ok = Expr::vec3([Expr::center_u(), Expr::center_v(), Expr::literal(1.0f32)]);
        assert_eq!(ok.get_type(), Some(Type::Vec3));

        let bad = Expr::vec3([Expr::center_u(), Expr::literal(1), Expr::literal(1.0f32)]);
        assert_eq!(bad.get_type(), None);

        let inner = Expr::vec2([Expr::center_u(), Expr::center_v()]);
        let nested = Expr::vec2([Expr::center_u(), inner]);
        assert_eq!(nested.get_type(), None);

        let (u, v) = (Expr::center_u(), Expr::center_v());
        let four = Expr::vec4([u.clone(), v.clone(), u, v]);
        assert_eq!(four.get_type(), Some(Type::Vec4));
    }

    #[test]
    fn test_binary_type() {
        let ok = Expr::add(Expr::center_u(), Expr::literal(1.0f32));
        assert_eq!(ok.get_type(), Some(Type::Float));
        let bad = Expr::add(Expr::center_u(), Expr::literal(1));
        assert_eq!(bad.get_type(), None);
    }

    #[test]
    fn test_shared_subtree() {
        let u = Expr::center_u();
        let sq = Expr::mul(u.clone(), u.clone());
        assert_eq!(Arc::strong_count(&u), 3);
        assert_eq!(sq.get_type(), Some(Type::Float));
    }

    #[test]
    fn test_display() {
        let e = Expr::vec3([
            Expr::sin(Expr::mul(Expr::center_u(), Expr::literal(2.0f32))),
            Expr::int_to_float(Expr::float_to_int(Expr::center_v())),
            Expr::literal(1.0f32),
        ]);
        assert_eq!(e.to_string(), "vec3(sin((u * 2.0)), float(int(v)), 1.0)");
    }

    #[test]
    fn test_op_apply() {
        assert_eq!(BinOp::Sub.apply(3.0, 1.0), 2.0);
        assert_eq!(UnaryOp::Sine.apply(0.0), 0.0);
        assert!(UnaryOp::Arcsine.apply(2.0).is_nan());
    }
}
