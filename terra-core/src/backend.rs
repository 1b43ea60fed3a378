//! Whole-raster CPU backend
//!
//! Evaluates the height and color fields over the full raster in one call,
//! for editors that redraw after every expression change. Unlike the
//! interpreters, a missing or ill-typed expression replaces the current
//! one with a zero constant, so the map always reflects the latest edit.

use tracing::{debug, warn};

use crate::compiler::{compile, Builtins, Evaluator, Float3};
use crate::error::{Error, Result};
use crate::expression::Expr;

/// Notified after every [`CpuBackend::compute_height_map`].
pub trait HeightMapObserver {
    fn observe(&mut self, data: &[f32], width: usize, height: usize);
}

impl<F: FnMut(&[f32], usize, usize)> HeightMapObserver for F {
    fn observe(&mut self, data: &[f32], width: usize, height: usize) {
        self(data, width, height)
    }
}

pub struct CpuBackend {
    width: usize,
    height: usize,
    height_map: Vec<f32>,
    surface: Vec<[u8; 3]>,
    height_expr: Evaluator<f32>,
    color_expr: Evaluator<Float3>,
    observers: Vec<Box<dyn HeightMapObserver>>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            height_map: Vec::new(),
            surface: Vec::new(),
            height_expr: Evaluator::constant(0.0),
            color_expr: Evaluator::constant([0.0; 3]),
            observers: Vec::new(),
        }
    }

    pub fn add_height_map_observer(&mut self, observer: impl HeightMapObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.height_map.resize(width * height, 0.0);
        self.surface.resize(width * height, [0; 3]);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Installs a new height expression.
    ///
    /// `None` or an expression that does not lower to `float` resets the
    /// height field to zero and reports the failure.
    pub fn set_height_expr(&mut self, expr: Option<&Expr>) -> Result<()> {
        let result = expr
            .ok_or(Error::MissingExpr("height"))
            .and_then(compile::<f32>);
        match result {
            Ok(evaluator) => {
                self.height_expr = evaluator;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "height expression reset to zero");
                self.height_expr = Evaluator::constant(0.0);
                Err(e)
            }
        }
    }

    /// Installs a new `vec3` color expression, resetting to black on failure.
    pub fn set_color_expr(&mut self, expr: Option<&Expr>) -> Result<()> {
        let result = expr
            .ok_or(Error::MissingExpr("color"))
            .and_then(compile::<Float3>);
        match result {
            Ok(evaluator) => {
                self.color_expr = evaluator;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "color expression reset to black");
                self.color_expr = Evaluator::constant([0.0; 3]);
                Err(e)
            }
        }
    }

    pub fn compute_height_map(&mut self) {
        let (w, h) = (self.width, self.height);
        for (i, value) in self.height_map.iter_mut().enumerate() {
            *value = self.height_expr.eval(&Builtins::at(i % w, i / w, w, h));
        }
        debug!(width = w, height = h, "height map computed");

        for observer in &mut self.observers {
            observer.observe(&self.height_map, w, h);
        }
    }

    pub fn compute_surface(&mut self) {
        let (w, h) = (self.width, self.height);
        for (i, rgb) in self.surface.iter_mut().enumerate() {
            let color = self.color_expr.eval(&Builtins::at(i % w, i / w, w, h));
            *rgb = color.map(|c| (c * 255.0).clamp(0.0, 255.0) as u8);
        }
        debug!(width = w, height = h, "surface computed");
    }

    /// Copies the height map into `buffer`, which must hold exactly `width * height` values.
    pub fn read_height_map(&self, buffer: &mut [f32]) -> Result<()> {
        if buffer.len() != self.height_map.len() {
            return Err(Error::BufferSize {
                expected: self.height_map.len(),
                actual: buffer.len(),
            });
        }
        buffer.copy_from_slice(&self.height_map);
        Ok(())
    }

    pub fn height_map(&self) -> &[f32] {
        &self.height_map
    }

    pub fn surface(&self) -> &[[u8; 3]] {
        &self.surface
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}
