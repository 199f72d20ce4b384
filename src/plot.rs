//! Curve sampling for `DRAW-PLOT`.
//!
//! The evaluator only samples: it calls the curve procedure once per x
//! position and hands the resulting [`Plot`] to a [`PlotSink`]. Drawing is up
//! to the sink. The canvas maps 10 pixels to one unit with the origin at the
//! canvas centre, and x runs across the full canvas width in steps of 0.1.

use tracing::debug;

use crate::Error;
use crate::environment::Env;
use crate::evaluator::Evaluator;
use crate::value::{Lambda, Value};

/// Pixels per unit on both axes
pub const PIXELS_PER_UNIT: f64 = 10.0;

/// Distance between consecutive x samples
pub const SAMPLE_STEP: f64 = 0.1;

/// Largest canvas side `DRAW-PLOT` accepts, in pixels
pub const MAX_CANVAS_SIZE: u32 = 16_384;

/// A requested canvas side as pixels. Sizes that are not finite or fall
/// outside `0..=MAX_CANVAS_SIZE` are rejected; fractions are truncated.
pub fn canvas_size(requested: f64) -> Option<u32> {
    if requested.is_finite() && (0.0..=f64::from(MAX_CANVAS_SIZE)).contains(&requested) {
        Some(requested as u32)
    } else {
        None
    }
}

/// One curve output
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Finite(f64),
    /// Infinite, NaN or not a number at all: the pen is lifted here
    NonFinite,
}

impl Sample {
    pub fn from_value(value: &Value) -> Sample {
        match value {
            Value::Number(y) if y.is_finite() => Sample::Finite(*y),
            _ => Sample::NonFinite,
        }
    }

    pub fn is_finite(self) -> bool {
        matches!(self, Sample::Finite(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    pub x: f64,
    pub y: Sample,
}

/// A sampled curve on a `width` x `height` pixel canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub width: u32,
    pub height: u32,
    pub points: Vec<PlotPoint>,
}

impl Plot {
    /// Pixel coordinates of the origin
    pub fn origin(&self) -> (i64, i64) {
        (i64::from(self.width / 2), i64::from(self.height / 2))
    }

    /// Canvas pixel for a point, clamped to the canvas. `None` when the
    /// sample is not finite.
    pub fn pixel(&self, point: &PlotPoint) -> Option<(i64, i64)> {
        let Sample::Finite(y) = point.y else {
            return None;
        };
        let (origin_x, origin_y) = self.origin();
        let max_x = (i64::from(self.width) - 1).max(0);
        let max_y = (i64::from(self.height) - 1).max(0);

        let px = origin_x + (point.x * PIXELS_PER_UNIT) as i64;
        let py = origin_y - (y * PIXELS_PER_UNIT) as i64;
        Some((px.clamp(0, max_x), py.clamp(0, max_y)))
    }

    /// Pen-down runs of pixels. A non-finite sample ends the current run.
    pub fn strokes(&self) -> Vec<Vec<(i64, i64)>> {
        let mut strokes = Vec::new();
        let mut current = Vec::new();
        for point in &self.points {
            match self.pixel(point) {
                Some(pixel) => current.push(pixel),
                None if !current.is_empty() => strokes.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            strokes.push(current);
        }
        strokes
    }
}

/// Receives every curve `DRAW-PLOT` samples
pub trait PlotSink {
    fn draw(&self, plot: &Plot);
}

/// Discards plots after logging them
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlotter;

impl PlotSink for NullPlotter {
    fn draw(&self, plot: &Plot) {
        debug!(
            width = plot.width,
            height = plot.height,
            samples = plot.points.len(),
            strokes = plot.strokes().len(),
            "plot discarded"
        );
    }
}

/// Evaluate `curve` at `x` in `env`
pub fn sample(evaluator: &Evaluator, curve: &Value, x: f64, env: &Env) -> Result<Sample, Error> {
    let lambda = curve.as_procedure()?;
    let y = evaluator.apply_lambda(lambda, &[Value::Number(x)], env)?;
    Ok(Sample::from_value(&y))
}

/// Sample `lambda` across a canvas of the given size.
///
/// Callers bound `width` with [`canvas_size`].
pub(crate) fn sample_curve(
    evaluator: &Evaluator,
    lambda: &Lambda,
    width: u32,
    height: u32,
    env: &Env,
    depth: usize,
) -> Result<Plot, Error> {
    let origin_x = f64::from(width / 2);
    let x_min = -origin_x / PIXELS_PER_UNIT;
    let x_max = (f64::from(width) - origin_x) / PIXELS_PER_UNIT;
    let steps = ((x_max - x_min) / SAMPLE_STEP + 1e-6).floor() as usize;

    let mut points = Vec::new();
    for i in 0..=steps {
        let x = x_min + i as f64 * SAMPLE_STEP;
        let y = evaluator.apply_lambda_at(lambda, &[Value::Number(x)], env, depth)?;
        points.push(PlotPoint {
            x,
            y: Sample::from_value(&y),
        });
    }

    Ok(Plot {
        width,
        height,
        points,
    })
}

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Session;

    fn point(x: f64, y: Sample) -> PlotPoint {
        PlotPoint { x, y }
    }

    #[test]
    fn test_sample() {
        let session = Session::new();
        let curve = session.evaluate("(lambda (x) (* x x))").unwrap();
        assert_eq!(session.sample(&curve, 3.0), Ok(Sample::Finite(9.0)));

        let curve = session.evaluate("(lambda (x) (/ 1 x))").unwrap();
        assert_eq!(session.sample(&curve, 0.5), Ok(Sample::Finite(2.0)));
        assert!(matches!(session.sample(&curve, 0.0), Err(Error::DivisionByZero(_))));

        let curve = session.evaluate("(lambda (x) (sqrt x))").unwrap();
        assert_eq!(session.sample(&curve, -1.0), Ok(Sample::NonFinite));

        let curve = session.evaluate("(lambda (x) \"text\")").unwrap();
        assert_eq!(session.sample(&curve, 1.0), Ok(Sample::NonFinite));

        assert!(matches!(
            session.sample(&Value::from(1), 1.0),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_canvas_size() {
        let test_cases = vec![
            (0.0, Some(0)),
            (20.0, Some(20)),
            (20.9, Some(20)),
            (16_384.0, Some(MAX_CANVAS_SIZE)),
            (16_385.0, None),
            (1e11, None),
            (-1.0, None),
            (f64::NAN, None),
            (f64::INFINITY, None),
        ];
        for (requested, expected) in test_cases {
            assert_eq!(canvas_size(requested), expected, "canvas_size({requested})");
        }
    }

    #[test]
    fn test_sample_curve_range() {
        let session = Session::new();
        let curve = session.evaluate("(lambda (x) x)").unwrap();
        let lambda = curve.as_procedure().unwrap();

        let plot =
            sample_curve(session.evaluator(), lambda, 41, 20, session.root(), 0).unwrap();
        // Origin at pixel 20, so x covers [-2, 2.1]
        assert_eq!(plot.points.len(), 42);
        assert!((plot.points[0].x + 2.0).abs() < 1e-9);
        assert!((plot.points[41].x - 2.1).abs() < 1e-9);
        assert!(plot.points.iter().all(|p| p.y.is_finite()));
    }

    #[test]
    fn test_pixel_mapping_and_clamping() {
        let plot = Plot {
            width: 100,
            height: 80,
            points: vec![],
        };
        assert_eq!(plot.origin(), (50, 40));
        assert_eq!(plot.pixel(&point(0.0, Sample::Finite(0.0))), Some((50, 40)));
        assert_eq!(plot.pixel(&point(1.0, Sample::Finite(2.0))), Some((60, 20)));
        assert_eq!(plot.pixel(&point(-1.5, Sample::Finite(-1.0))), Some((35, 50)));
        // Off-canvas samples stick to the edge
        assert_eq!(plot.pixel(&point(0.0, Sample::Finite(1e6))), Some((50, 0)));
        assert_eq!(plot.pixel(&point(99.0, Sample::Finite(-99.0))), Some((99, 79)));
        assert_eq!(plot.pixel(&point(0.0, Sample::NonFinite)), None);

        let empty = Plot {
            width: 0,
            height: 0,
            points: vec![],
        };
        assert_eq!(empty.pixel(&point(3.0, Sample::Finite(3.0))), Some((0, 0)));
    }

    #[test]
    fn test_strokes_split_at_non_finite() {
        let plot = Plot {
            width: 100,
            height: 100,
            points: vec![
                point(-0.2, Sample::NonFinite),
                point(-0.1, Sample::Finite(1.0)),
                point(0.0, Sample::Finite(1.0)),
                point(0.1, Sample::NonFinite),
                point(0.2, Sample::NonFinite),
                point(0.3, Sample::Finite(0.0)),
            ],
        };
        assert_eq!(
            plot.strokes(),
            vec![vec![(49, 40), (50, 40)], vec![(53, 50)]]
        );
    }

    #[test]
    fn test_sample_from_value() {
        assert_eq!(Sample::from_value(&Value::from(1.5)), Sample::Finite(1.5));
        assert_eq!(Sample::from_value(&Value::Number(f64::INFINITY)), Sample::NonFinite);
        assert_eq!(Sample::from_value(&Value::Number(f64::NAN)), Sample::NonFinite);
        assert_eq!(Sample::from_value(&Value::from(true)), Sample::NonFinite);
    }
}
