//! Shared statistics helpers
//!
//! Small closed-form pieces used by the trend and anomaly detectors:
//! mean, sample standard deviation, and an ordinary least-squares fit.

/// Ordinary least-squares line fit over (x, y) points
#[derive(Debug, Clone, Copy)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination, 0.0-1.0
    pub r_squared: f64,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (Bessel's correction)
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Fit a line through the points. Returns `None` for fewer than two
/// points or a degenerate x spread.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<LinearFit> {
    let n = points.len() as f64;
    if points.len() < 2 {
        return None;
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for &(x, y) in points {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return None;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let mean_y = sum_y / n;
    let intercept = mean_y - slope * (sum_x / n);

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for &(x, y) in points {
        let predicted = slope * x + intercept;
        ss_res += (y - predicted).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }

    // A flat series is fit perfectly by its own horizontal line
    let r_squared = if ss_tot.abs() < f64::EPSILON {
        if ss_res.abs() < f64::EPSILON {
            1.0
        } else {
            0.0
        }
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_line_has_unit_r_squared() {
        let points: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, 3.0 + 2.0 * i as f64)).collect();
        let fit = linear_fit(&points).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_noise_lowers_r_squared() {
        let points: Vec<(f64, f64)> = (0..20)
            .map(|i| {
                let wobble = if i % 2 == 0 { 5.0 } else { -5.0 };
                (i as f64, 2.0 * i as f64 + wobble)
            })
            .collect();
        let fit = linear_fit(&points).unwrap();
        assert!(fit.r_squared < 1.0);
        assert!(fit.r_squared > 0.5);
    }

    #[test]
    fn test_flat_series_is_a_perfect_zero_slope_fit() {
        let points: Vec<(f64, f64)> = (0..15).map(|i| (i as f64, 42.0)).collect();
        let fit = linear_fit(&points).unwrap();
        assert!(fit.slope.abs() < 1e-12);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_inputs_yield_none() {
        assert!(linear_fit(&[]).is_none());
        assert!(linear_fit(&[(1.0, 2.0)]).is_none());
        // All x identical: no spread to fit against
        assert!(linear_fit(&[(5.0, 1.0), (5.0, 2.0), (5.0, 3.0)]).is_none());
    }

    #[test]
    fn test_mean_and_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-9);
        // Sample std dev of this classic set is ~2.138
        assert!((std_dev(&values) - 2.138).abs() < 0.01);
        assert_eq!(std_dev(&[1.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
