use na::{DMatrix, DVector};

use crate::plant::Discretization;

/// 自由応答 f[i] = a^(i+1)
pub fn create_f_matrix(disc: &Discretization, n: usize) -> DVector<f64> {
    DVector::from_fn(n, |i, _| disc.a.powi((i + 1) as i32))
}

/// 入力応答 g[(i, j)] = a^(i-j) c  (j <= i)
pub fn create_g_matrix(disc: &Discretization, n: usize) -> DMatrix<f64> {
    let mut g = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        for j in 0..=i {
            g[(i, j)] = disc.a.powi((i - j) as i32) * disc.c;
        }
    }
    g
}

/// 差分行列 (D u)[i] = u[i] - u[i-1], 先頭は前回入力との差
pub fn create_d_matrix(n: usize) -> DMatrix<f64> {
    let mut d = DMatrix::<f64>::identity(n, n);
    for i in 1..n {
        d[(i, i - 1)] = -1.0;
    }
    d
}

/// Quadratic MPC objective over the free controls `u = p[1..n]`.
///
/// `J(u) = wq |F v0 + G u - r|^2 + wr |D u - e0 p0|^2`
#[derive(Debug, Clone)]
pub struct TrackingCost {
    f: DVector<f64>,
    g: DMatrix<f64>,
    d: DMatrix<f64>,
    v0: f64,
    p0: f64,
    reference: DVector<f64>,
    tracking_weight: f64,
    rate_weight: f64,
}

impl TrackingCost {
    /// `reference` covers the predicted points only (grid points 1..n).
    pub fn new(
        disc: &Discretization,
        v0: f64,
        p0: f64,
        reference: &[f64],
        tracking_weight: f64,
        rate_weight: f64,
    ) -> Self {
        let n = reference.len();
        Self {
            f: create_f_matrix(disc, n),
            g: create_g_matrix(disc, n),
            d: create_d_matrix(n),
            v0,
            p0,
            reference: DVector::from_column_slice(reference),
            tracking_weight,
            rate_weight,
        }
    }

    pub fn dim(&self) -> usize {
        self.reference.len()
    }

    /// Predicted states at grid points 1..n.
    pub fn predict(&self, u: &[f64]) -> DVector<f64> {
        let u = DVector::from_column_slice(u);
        &self.f * self.v0 + &self.g * u
    }

    fn residuals(&self, u: &[f64]) -> (DVector<f64>, DVector<f64>) {
        let e = self.predict(u) - &self.reference;
        let mut du = &self.d * DVector::from_column_slice(u);
        du[0] -= self.p0;
        (e, du)
    }

    pub fn cost(&self, u: &[f64]) -> f64 {
        let (e, du) = self.residuals(u);
        self.tracking_weight * e.norm_squared() + self.rate_weight * du.norm_squared()
    }

    pub fn gradient(&self, u: &[f64], grad: &mut [f64]) {
        let (e, du) = self.residuals(u);
        let g = 2.0 * self.tracking_weight * self.g.tr_mul(&e)
            + 2.0 * self.rate_weight * self.d.tr_mul(&du);
        grad.copy_from_slice(g.as_slice());
    }
}
