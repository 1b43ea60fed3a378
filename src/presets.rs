//! Named terrain expressions
//!
//! There is no textual expression language, so the command-line tools pick
//! from these prebuilt trees. Every preset is plain IR built from the
//! constructors in [`terra_core::Expr`].

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use terra_core::{Expr, ExprRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeightPreset {
    /// Zero everywhere
    Flat,
    /// Rises from west to east
    #[default]
    GradientU,
    /// Rises from north to south
    GradientV,
    /// Interfering sine and cosine waves
    Ripple,
    /// Paraboloid peaking at the center
    Dome,
    /// Eight flat steps along u
    Terraces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorPreset {
    /// Red follows u, green follows v, full blue
    #[default]
    Uv,
    /// Grayscale copy of the height field
    Height,
    White,
}

fn lit(value: f32) -> ExprRef {
    Expr::literal(value)
}

impl HeightPreset {
    pub fn build(self) -> ExprRef {
        match self {
            HeightPreset::Flat => lit(0.0),
            HeightPreset::GradientU => Expr::center_u(),
            HeightPreset::GradientV => Expr::center_v(),
            HeightPreset::Ripple => {
                // 0.5 + 0.25 * (sin(20u) + cos(20v))
                let waves = Expr::add(
                    Expr::sin(Expr::mul(Expr::center_u(), lit(20.0))),
                    Expr::cos(Expr::mul(Expr::center_v(), lit(20.0))),
                );
                Expr::add(lit(0.5), Expr::mul(lit(0.25), waves))
            }
            HeightPreset::Dome => {
                // 1 - 2 * ((u - 0.5)^2 + (v - 0.5)^2)
                let du = Expr::sub(Expr::center_u(), lit(0.5));
                let dv = Expr::sub(Expr::center_v(), lit(0.5));
                let r2 = Expr::add(Expr::mul(du.clone(), du), Expr::mul(dv.clone(), dv));
                Expr::sub(lit(1.0), Expr::mul(lit(2.0), r2))
            }
            HeightPreset::Terraces => {
                // float(int(u * 8)) / 8
                let step = Expr::float_to_int(Expr::mul(Expr::center_u(), lit(8.0)));
                Expr::div(Expr::int_to_float(step), lit(8.0))
            }
        }
    }
}

impl ColorPreset {
    /// Builds the color expression; `height` is shared, not copied.
    pub fn build(self, height: &ExprRef) -> ExprRef {
        match self {
            ColorPreset::Uv => Expr::vec3([Expr::center_u(), Expr::center_v(), lit(1.0)]),
            ColorPreset::Height => Expr::vec3([height.clone(), height.clone(), height.clone()]),
            ColorPreset::White => Expr::vec3([lit(1.0), lit(1.0), lit(1.0)]),
        }
    }
}
