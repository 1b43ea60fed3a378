//! Value kinds of the expression language

use std::fmt;

/// Static kind of a value produced by an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl Type {
    /// Kind of a native literal type, resolved at compile time.
    pub const fn of<T: TypeMap>() -> Type {
        T::TYPE
    }

    /// Float vector kind with `n` components, if one exists.
    pub fn vector(n: usize) -> Option<Type> {
        match n {
            2 => Some(Type::Vec2),
            3 => Some(Type::Vec3),
            4 => Some(Type::Vec4),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Float => "float",
            Type::Int => "int",
            Type::Vec2 => "vec2",
            Type::Vec3 => "vec3",
            Type::Vec4 => "vec4",
            Type::Mat2 => "mat2",
            Type::Mat3 => "mat3",
            Type::Mat4 => "mat4",
        };
        f.write_str(name)
    }
}

/// Maps a native literal type to its [`Type`] tag.
///
/// Only `i32` and `f32` implement it, so a literal of any other type
/// fails to compile rather than at runtime.
pub trait TypeMap: Copy + Send + Sync + 'static {
    const TYPE: Type;
}

impl TypeMap for i32 {
    const TYPE: Type = Type::Int;
}

impl TypeMap for f32 {
    const TYPE: Type = Type::Float;
}
