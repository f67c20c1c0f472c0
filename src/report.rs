//! CSV logs and the two-panel plot.

use std::path::Path;

use anyhow::{anyhow, Result};
use gnuplot::{AutoOption, AxesCommon, Caption, Color, DashType, Figure, LineStyle, LineWidth};
use log::info;

use crate::extract::SolveResult;
use crate::receding::ClosedLoopTrace;

/// Staircase points for a zero-order-hold plot.
///
/// `values[i]` holds over `(time[i-1], time[i]]`, the way the plant equation
/// uses the control.
pub fn step_series(time: &[f64], values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut x = Vec::with_capacity(2 * time.len());
    let mut y = Vec::with_capacity(2 * time.len());
    for (i, (&t, &v)) in time.iter().zip(values).enumerate() {
        if i > 0 {
            x.push(time[i - 1]);
            y.push(v);
        }
        x.push(t);
        y.push(v);
    }
    (x, y)
}

/// MV axis range: the bound range plus a 5% margin on top.
pub fn control_range(bounds: (f64, f64), values: &[f64]) -> (f64, f64) {
    let (lower, upper) = bounds;
    if lower.is_finite() && upper.is_finite() && upper > lower {
        return (lower, upper + 0.05 * (upper - lower));
    }
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let margin = 0.05 * (hi - lo).abs().max(1.0);
    (lo - margin, hi + margin)
}

pub fn write_csv(result: &SolveResult, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["time", "reference", "state", "set_point", "control"])?;
    for i in 0..result.time.len() {
        wtr.write_record(&[
            result.time[i].to_string(),
            result.reference[i].to_string(),
            result.state[i].to_string(),
            result.set_point.to_string(),
            result.control[i].to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trace_csv(trace: &ClosedLoopTrace, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["time", "state", "set_point", "control"])?;
    for i in 0..trace.time.len() {
        wtr.write_record(&[
            trace.time[i].to_string(),
            trace.state[i].to_string(),
            trace.set_point.to_string(),
            trace.control[i].to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub struct ReportRenderer {
    title: String,
    state_label: String,
    control_label: String,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self {
            title: "Model Predictive Control (MPC) - Cruise Control".to_string(),
            state_label: "Velocity (m/s)".to_string(),
            control_label: "Gas Pedal (%)".to_string(),
        }
    }
}

impl ReportRenderer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn render(&self, result: &SolveResult, path: &Path) -> Result<()> {
        let set_point = vec![result.set_point; result.time.len()];
        self.draw(
            &result.time,
            &result.state,
            Some(result.reference.as_slice()),
            &set_point,
            &result.control,
            result.control_bounds,
            path,
        )
    }

    pub fn render_trace(&self, trace: &ClosedLoopTrace, path: &Path) -> Result<()> {
        let set_point = vec![trace.set_point; trace.time.len()];
        self.draw(
            &trace.time,
            &trace.state,
            None,
            &set_point,
            &trace.control,
            trace.control_bounds,
            path,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn draw(
        &self,
        time: &[f64],
        state: &[f64],
        reference: Option<&[f64]>,
        set_point: &[f64],
        control: &[f64],
        bounds: (f64, f64),
        path: &Path,
    ) -> Result<()> {
        let mut fg = Figure::new();
        fg.set_multiplot_layout(2, 1);

        let set_point_caption = format!("Final Set Point ({:.0})", set_point[0]);
        let cv = fg.axes2d();
        cv.set_title(&self.title, &[])
            .set_y_label(&self.state_label, &[])
            .set_x_grid(true)
            .set_y_grid(true);
        if let Some(reference) = reference {
            cv.lines(
                time,
                reference,
                &[
                    Caption("Reference Trajectory"),
                    Color("black"),
                    LineStyle(DashType::Dot),
                    LineWidth(2.0),
                ],
            );
        }
        cv.lines(
            time,
            state,
            &[Caption("CV Response"), Color("red"), LineWidth(3.0)],
        )
        .lines(
            time,
            set_point,
            &[
                Caption(set_point_caption.as_str()),
                Color("black"),
                LineStyle(DashType::Dash),
                LineWidth(1.0),
            ],
        );

        let (x, y) = step_series(time, control);
        let (lo, hi) = control_range(bounds, control);
        fg.axes2d()
            .set_x_label("Time (seconds)", &[])
            .set_y_label(&self.control_label, &[])
            .set_y_range(AutoOption::Fix(lo), AutoOption::Fix(hi))
            .set_x_grid(true)
            .set_y_grid(true)
            .lines(&x, &y, &[Caption("MV Optimized"), Color("blue"), LineWidth(3.0)]);

        let out = path.to_string_lossy();
        fg.save_to_svg(&*out, 1000, 800)
            .map_err(|e| anyhow!("gnuplot failed to render {out}: {e:?}"))?;
        info!("plot saved to {out}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_series() {
        let (x, y) = step_series(&[0.0, 0.5, 1.0], &[0.0, 20.0, 40.0]);
        assert_eq!(x, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(y, vec![0.0, 20.0, 20.0, 40.0, 40.0]);
    }

    #[test]
    fn test_control_range() {
        assert_eq!(control_range((0.0, 100.0), &[]), (0.0, 105.0));
        let (lo, hi) = control_range((f64::NEG_INFINITY, f64::INFINITY), &[2.0, 4.0]);
        assert!(lo < 2.0 && hi > 4.0);
    }
}
