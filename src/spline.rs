/**
 * Piecewise-linear fit through tabulated rate data. Off the ends of the
 * table the end segment is extended, so extrapolation is linear in the
 * table's own coordinates.
 */
pub struct LinearSpline {
    x: Vec<f64>,
    y: Vec<f64>,
}




// ============================================================================
impl LinearSpline {

    /// Points must be sorted by abscissa and contain at least two entries.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        assert!(points.len() >= 2, "spline needs at least two points");
        let (x, y) = points.into_iter().unzip();
        Self { x, y }
    }

    pub fn interpolate(&self, t: f64) -> f64 {
        let seg = segment(&self.x, t);
        let h = self.x[seg + 1] - self.x[seg];
        let b = (t - self.x[seg]) / h;
        self.y[seg] * (1.0 - b) + self.y[seg + 1] * b
    }
}




/**
 * Natural cubic spline through tabulated data. Off the ends the curve is
 * continued linearly along the end tangent.
 */
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    y2: Vec<f64>,
}




// ============================================================================
impl CubicSpline {

    /// Points must be sorted by abscissa and contain at least three entries.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        assert!(points.len() >= 3, "cubic spline needs at least three points");
        let (x, y): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        let n = x.len();

        let mut y2 = vec![0.0; n];
        let mut u = vec![0.0; n];
        for i in 1..n - 1 {
            let sig = (x[i] - x[i - 1]) / (x[i + 1] - x[i - 1]);
            let p = sig * y2[i - 1] + 2.0;
            y2[i] = (sig - 1.0) / p;
            u[i] = (y[i + 1] - y[i]) / (x[i + 1] - x[i]) - (y[i] - y[i - 1]) / (x[i] - x[i - 1]);
            u[i] = (6.0 * u[i] / (x[i + 1] - x[i - 1]) - sig * u[i - 1]) / p;
        }
        for k in (0..n - 1).rev() {
            y2[k] = y2[k] * y2[k + 1] + u[k];
        }

        Self { x, y, y2 }
    }

    pub fn interpolate(&self, t: f64) -> f64 {
        let n = self.x.len();
        if t < self.x[0] {
            return self.y[0] + self.derivative_at(0, self.x[0]) * (t - self.x[0]);
        }
        if t > self.x[n - 1] {
            return self.y[n - 1] + self.derivative_at(n - 2, self.x[n - 1]) * (t - self.x[n - 1]);
        }
        let seg = segment(&self.x, t);
        let h = self.x[seg + 1] - self.x[seg];
        let a = (self.x[seg + 1] - t) / h;
        let b = (t - self.x[seg]) / h;
        a * self.y[seg]
            + b * self.y[seg + 1]
            + ((a * a * a - a) * self.y2[seg] + (b * b * b - b) * self.y2[seg + 1]) * h * h / 6.0
    }

    fn derivative_at(&self, seg: usize, t: f64) -> f64 {
        let h = self.x[seg + 1] - self.x[seg];
        let a = (self.x[seg + 1] - t) / h;
        let b = (t - self.x[seg]) / h;
        (self.y[seg + 1] - self.y[seg]) / h
            - (3.0 * a * a - 1.0) / 6.0 * h * self.y2[seg]
            + (3.0 * b * b - 1.0) / 6.0 * h * self.y2[seg + 1]
    }
}

/// Index of the table segment containing (or, off the ends, nearest to) t.
fn segment(x: &[f64], t: f64) -> usize {
    let n = x.len();
    match x.binary_search_by(|v| v.partial_cmp(&t).unwrap()) {
        Ok(i) => i.min(n - 2),
        Err(0) => 0,
        Err(i) => (i - 1).min(n - 2),
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::{CubicSpline, LinearSpline};

    #[test]
    fn linear_spline_interpolates_between_knots() {
        let spline = LinearSpline::new(vec![(0.0, 0.0), (1.0, 2.0), (2.0, 0.0)]);
        assert!((spline.interpolate(0.5) - 1.0).abs() < 1e-14);
        assert!((spline.interpolate(1.5) - 1.0).abs() < 1e-14);
    }

    #[test]
    fn linear_spline_extrapolates_the_end_segments() {
        let spline = LinearSpline::new(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!((spline.interpolate(3.0) - 3.0).abs() < 1e-14);
        assert!((spline.interpolate(-1.0) + 1.0).abs() < 1e-14);
    }

    #[test]
    fn cubic_spline_passes_through_the_knots() {
        let points: Vec<_> = (0..6).map(|i| (i as f64, (i as f64).sin())).collect();
        let spline = CubicSpline::new(points.clone());
        for (x, y) in points {
            assert!((spline.interpolate(x) - y).abs() < 1e-12);
        }
    }

    #[test]
    fn cubic_spline_is_exact_on_straight_lines() {
        let points: Vec<_> = (0..5).map(|i| (i as f64, 3.0 * i as f64 + 1.0)).collect();
        let spline = CubicSpline::new(points);
        assert!((spline.interpolate(2.5) - 8.5).abs() < 1e-12);
        assert!((spline.interpolate(7.0) - 22.0).abs() < 1e-12);
    }
}
