use crate::error::ConfigError;

/// Uniform time discretization shared by every variable of a problem.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonGrid {
    t0: f64,
    tf: f64,
    points: Vec<f64>,
}

impl HorizonGrid {
    /// `steps` points from `t0` to `tf`, both endpoints included.
    pub fn new(t0: f64, tf: f64, steps: usize) -> Result<Self, ConfigError> {
        if steps < 2 {
            return Err(ConfigError::InvalidGrid(format!(
                "steps must be at least 2, got {steps}"
            )));
        }
        if !t0.is_finite() || !tf.is_finite() {
            return Err(ConfigError::InvalidGrid(format!(
                "bounds must be finite, got [{t0}, {tf}]"
            )));
        }
        if tf <= t0 {
            return Err(ConfigError::InvalidGrid(format!(
                "tf ({tf}) must be greater than t0 ({t0})"
            )));
        }

        let dt = (tf - t0) / (steps - 1) as f64;
        let mut points: Vec<f64> = (0..steps).map(|i| t0 + i as f64 * dt).collect();
        // 丸め誤差で終端がずれないように固定
        points[steps - 1] = tf;

        Ok(Self { t0, tf, points })
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn tf(&self) -> f64 {
        self.tf
    }

    pub fn dt(&self) -> f64 {
        (self.tf - self.t0) / (self.points.len() - 1) as f64
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a grid has at least two points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_shape() {
        for &(t0, tf, steps) in &[(0.0, 20.0, 41), (-1.0, 1.0, 2), (0.5, 3.7, 17)] {
            let grid = HorizonGrid::new(t0, tf, steps).unwrap();
            let t = grid.points();
            assert_eq!(t.len(), steps);
            assert_eq!(t[0], t0);
            assert_eq!(t[steps - 1], tf);
            assert!(t.windows(2).all(|w| w[1] > w[0]));
        }
    }

    #[test]
    fn test_grid_spacing() {
        let grid = HorizonGrid::new(0.0, 20.0, 41).unwrap();
        assert_relative_eq!(grid.dt(), 0.5);
        for w in grid.points().windows(2) {
            assert_relative_eq!(w[1] - w[0], 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_invalid_grid() {
        assert!(matches!(
            HorizonGrid::new(0.0, 20.0, 1),
            Err(ConfigError::InvalidGrid(_))
        ));
        assert!(matches!(
            HorizonGrid::new(0.0, 20.0, 0),
            Err(ConfigError::InvalidGrid(_))
        ));
        assert!(matches!(
            HorizonGrid::new(0.0, 0.0, 41),
            Err(ConfigError::InvalidGrid(_))
        ));
        assert!(matches!(
            HorizonGrid::new(5.0, 1.0, 41),
            Err(ConfigError::InvalidGrid(_))
        ));
        assert!(HorizonGrid::new(0.0, f64::NAN, 41).is_err());
    }
}
