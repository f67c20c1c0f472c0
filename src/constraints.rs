//! Feasible set of the free controls `u = p[1..n]`:
//!
//! - `lower <= u[i] <= upper`
//! - `|u[0] - p0| <= rate_limit`, `|u[i] - u[i-1]| <= rate_limit`
//!
//! The Euclidean projection onto the intersection is computed with Dykstra's
//! algorithm over three sets whose projections are closed-form: the box, the
//! even-indexed differences and the odd-indexed differences (each of the latter
//! two only couples disjoint pairs).

use optimization_engine::constraints::Constraint;

const MAX_SWEEPS: usize = 10_000;
const SWEEP_TOLERANCE: f64 = 1e-11;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitedBox {
    lower: f64,
    upper: f64,
    rate_limit: f64,
    previous: f64,
}

impl RateLimitedBox {
    /// `previous` is the already applied control `p0`.
    pub fn new(lower: f64, upper: f64, rate_limit: f64, previous: f64) -> Self {
        Self {
            lower,
            upper,
            rate_limit,
            previous,
        }
    }

    /// Non-empty iff the previous control can stay inside the box.
    pub fn is_feasible(&self) -> bool {
        self.lower <= self.previous && self.previous <= self.upper
    }

    /// Largest bound or rate violation of `u`.
    pub fn violation(&self, u: &[f64]) -> f64 {
        let mut prev = self.previous;
        u.iter().fold(0.0f64, |acc, &x| {
            let bound = (self.lower - x).max(x - self.upper).max(0.0);
            let rate = ((x - prev).abs() - self.rate_limit).max(0.0);
            prev = x;
            acc.max(bound).max(rate)
        })
    }

    fn project_box(&self, x: &mut [f64]) {
        x.iter_mut()
            .for_each(|e| *e = e.clamp(self.lower, self.upper));
    }

    // (x[i-1], x[i]) の差を rate_limit 以内に
    fn project_pair(&self, x: &mut [f64], i: usize) {
        let d = x[i] - x[i - 1];
        if d > self.rate_limit {
            let shift = (d - self.rate_limit) / 2.0;
            x[i - 1] += shift;
            x[i] -= shift;
        } else if d < -self.rate_limit {
            let shift = (-self.rate_limit - d) / 2.0;
            x[i - 1] -= shift;
            x[i] += shift;
        }
    }

    fn project_even(&self, x: &mut [f64]) {
        if let Some(first) = x.first_mut() {
            *first = first.clamp(
                self.previous - self.rate_limit,
                self.previous + self.rate_limit,
            );
        }
        for i in (2..x.len()).step_by(2) {
            self.project_pair(x, i);
        }
    }

    fn project_odd(&self, x: &mut [f64]) {
        for i in (1..x.len()).step_by(2) {
            self.project_pair(x, i);
        }
    }

    fn project_onto(&self, set: usize, x: &mut [f64]) {
        match set {
            0 => self.project_even(x),
            1 => self.project_odd(x),
            _ => self.project_box(x),
        }
    }
}

impl Constraint for RateLimitedBox {
    fn project(&self, x: &mut [f64]) {
        if self.rate_limit.is_infinite() {
            self.project_box(x);
            return;
        }

        let n = x.len();
        let mut increments = [vec![0.0; n], vec![0.0; n], vec![0.0; n]];
        let mut y = vec![0.0; n];
        let mut prev = vec![0.0; n];

        for _ in 0..MAX_SWEEPS {
            prev.copy_from_slice(x);
            for (set, inc) in increments.iter_mut().enumerate() {
                for ((y_i, x_i), inc_i) in y.iter_mut().zip(x.iter()).zip(inc.iter()) {
                    *y_i = x_i + inc_i;
                }
                x.copy_from_slice(&y);
                self.project_onto(set, x);
                for ((inc_i, y_i), x_i) in inc.iter_mut().zip(y.iter()).zip(x.iter()) {
                    *inc_i = y_i - x_i;
                }
            }
            let change = x
                .iter()
                .zip(prev.iter())
                .fold(0.0f64, |acc, (a, b)| acc.max((a - b).abs()));
            if change < SWEEP_TOLERANCE {
                break;
            }
        }
    }

    fn is_convex(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_feasible_point_is_fixed() {
        let set = RateLimitedBox::new(0.0, 100.0, 20.0, 0.0);
        let mut x = [20.0, 40.0, 55.0, 50.0];
        set.project(&mut x);
        assert_eq!(x, [20.0, 40.0, 55.0, 50.0]);
    }

    #[test]
    fn test_projection_is_feasible() {
        let set = RateLimitedBox::new(0.0, 100.0, 20.0, 0.0);
        let mut x = [100.0, 100.0, -30.0, 150.0, 0.0, 90.0];
        set.project(&mut x);
        assert!(set.violation(&x) < 1e-6, "violation {}", set.violation(&x));
    }

    #[test]
    fn test_projection_of_single_step() {
        // 1変数なら単純なクランプ
        let set = RateLimitedBox::new(0.0, 100.0, 20.0, 10.0);
        let mut x = [90.0];
        set.project(&mut x);
        assert_relative_eq!(x[0], 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_projection_is_closest_point() {
        // 最近点は x1 = x0 + 20 上にあり, x0 は rate_limit でクランプされる
        let set = RateLimitedBox::new(-1e3, 1e3, 20.0, 0.0);
        let mut x = [0.0, 100.0];
        set.project(&mut x);
        assert_relative_eq!(x[0], 20.0, epsilon = 1e-6);
        assert_relative_eq!(x[1], 40.0, epsilon = 1e-6);
    }

    #[test]
    fn test_infeasible_previous() {
        assert!(RateLimitedBox::new(0.0, 100.0, 20.0, 50.0).is_feasible());
        assert!(!RateLimitedBox::new(0.0, 100.0, 20.0, -5.0).is_feasible());
    }
}
