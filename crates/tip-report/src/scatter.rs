use std::path::Path;

use image::{Rgb, RgbImage};
use tip_ml::evaluation::LineFit;

use crate::error::{ReportError, ReportResult};

const MARGIN: u32 = 40;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const POINT: Rgb<u8> = Rgb([31, 119, 180]);
const LINE: Rgb<u8> = Rgb([214, 39, 40]);

/// A closed interval that values are mapped from.
#[derive(Debug, Clone, Copy)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        let (min, max) = values
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() {
            return Self { min: 0.0, max: 1.0 };
        }
        if max - min < f64::EPSILON {
            return Self {
                min: min - 0.5,
                max: max + 0.5,
            };
        }
        let pad = (max - min) * 0.05;
        Self {
            min: min - pad,
            max: max + pad,
        }
    }

    fn fraction(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }
}

/// Renders actual values on the x axis against predictions on the y axis.
#[derive(Debug, Clone, Copy)]
pub struct ScatterPlot {
    width: u32,
    height: u32,
}

impl ScatterPlot {
    pub fn try_new(width: u32, height: u32) -> ReportResult<Self> {
        if width <= 2 * MARGIN || height <= 2 * MARGIN {
            return Err(ReportError::invalid(format!(
                "plot size {width}x{height} leaves no room inside the {MARGIN} pixel margins"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn render(&self, points: &[(f64, f64)], line: &LineFit) -> RgbImage {
        let mut image = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let x_range = Range::of(points.iter().map(|(x, _)| *x));
        let y_range = Range::of(points.iter().map(|(_, y)| *y));

        let (left, right) = (MARGIN, self.width - MARGIN);
        let (top, bottom) = (MARGIN, self.height - MARGIN);
        for x in left..=right {
            image.put_pixel(x, bottom, AXIS);
        }
        for y in top..=bottom {
            image.put_pixel(left, y, AXIS);
        }

        let to_pixel = |x: f64, y: f64| -> Option<(i64, i64)> {
            let (fx, fy) = (x_range.fraction(x), y_range.fraction(y));
            if !fx.is_finite() || !fy.is_finite() {
                return None;
            }
            let px = left as f64 + fx * (right - left) as f64;
            let py = bottom as f64 - fy * (bottom - top) as f64;
            Some((px.round() as i64, py.round() as i64))
        };
        let inside = |px: i64, py: i64| {
            px > left as i64 && px <= right as i64 && py >= top as i64 && py < bottom as i64
        };

        for (x, y) in points {
            if let Some((px, py)) = to_pixel(*x, *y) {
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        if inside(px + dx, py + dy) {
                            image.put_pixel((px + dx) as u32, (py + dy) as u32, POINT);
                        }
                    }
                }
            }
        }

        if line.is_finite() {
            let steps = (right - left) * 4;
            let mut previous: Option<(i64, i64)> = None;
            for i in 0..=steps {
                let x = x_range.min + (x_range.max - x_range.min) * i as f64 / steps as f64;
                let current = to_pixel(x, line.at(x));
                if let (Some((_, y0)), Some((x1, y1))) = (previous, current) {
                    // Fill vertical gaps where the line is steep.
                    let (lo, hi) = (y0.min(y1), y0.max(y1));
                    for py in lo..=hi {
                        if inside(x1, py) {
                            image.put_pixel(x1 as u32, py as u32, LINE);
                        }
                    }
                }
                previous = current;
            }
        }
        image
    }

    pub fn save(&self, path: &Path, points: &[(f64, f64)], line: &LineFit) -> ReportResult<()> {
        self.render(points, line).save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_points_and_line() {
        let plot = ScatterPlot { width: 200, height: 160 };
        let points = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)];
        let line = LineFit {
            slope: 1.0,
            intercept: 0.0,
        };
        let image = plot.render(&points, &line);
        assert_eq!(image.dimensions(), (200, 160));
        assert_eq!(*image.get_pixel(MARGIN, 160 - MARGIN), AXIS);
        let colored = |color: Rgb<u8>| image.pixels().filter(|p| **p == color).count();
        assert!(colored(POINT) > 0);
        assert!(colored(LINE) > 0);
    }

    #[test]
    fn test_render_without_line() {
        let plot = ScatterPlot { width: 120, height: 120 };
        let line = LineFit {
            slope: f64::NAN,
            intercept: f64::NAN,
        };
        let image = plot.render(&[(1.0, 1.0), (1.0, 2.0)], &line);
        assert_eq!(image.pixels().filter(|p| **p == LINE).count(), 0);
    }

    #[test]
    fn test_plot_too_small() {
        assert!(ScatterPlot::try_new(60, 400).is_err());
    }
}
