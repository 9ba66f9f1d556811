//! Numeric routines behind the forecast model: least squares, fit quality,
//! holdout error metrics and normal quantiles.

use statistical::mean;

/// Ordinary least squares of `values` against their index, returning `(intercept, slope)`
pub fn fit_linear_regression(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    if values.len() == 1 {
        return (values[0], 0.0);
    }

    let x_values: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let x_mean = mean(&x_values);
    let y_mean = mean(values);

    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in x_values.iter().zip(values) {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean).powi(2);
    }

    let slope = if den != 0.0 { num / den } else { 0.0 };
    let intercept = y_mean - slope * x_mean;
    (intercept, slope)
}

/// Coefficient of determination clamped to [0, 1]
pub fn r_squared(actual: &[f64], fitted: &[f64]) -> f64 {
    let n = actual.len().min(fitted.len());
    if n == 0 {
        return 0.0;
    }
    let y_mean = mean(&actual[..n]);
    let mut ss_tot = 0.0;
    let mut ss_res = 0.0;
    for (a, f) in actual.iter().zip(fitted).take(n) {
        ss_tot += (a - y_mean).powi(2);
        ss_res += (a - f).powi(2);
    }

    let r2 = if ss_tot > f64::EPSILON {
        1.0 - ss_res / ss_tot
    } else if ss_res <= f64::EPSILON {
        // Constant series reproduced exactly
        1.0
    } else {
        0.0
    };
    r2.clamp(0.0, 1.0)
}

/// Residual standard deviation with `params` fitted parameters
pub fn residual_std(actual: &[f64], fitted: &[f64], params: usize) -> f64 {
    let n = actual.len().min(fitted.len());
    if n == 0 {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(fitted)
        .take(n)
        .map(|(a, f)| (a - f).powi(2))
        .sum();
    let dof = n.saturating_sub(params).max(1);
    (ss_res / dof as f64).sqrt()
}

/// Mean absolute error
pub fn mean_absolute_error(forecast: &[f64], actual: &[f64]) -> f64 {
    let n = forecast.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = forecast
        .iter()
        .zip(actual)
        .take(n)
        .map(|(f, a)| (a - f).abs())
        .sum();
    sum / n as f64
}

/// Root mean squared error
pub fn root_mean_squared_error(forecast: &[f64], actual: &[f64]) -> f64 {
    let n = forecast.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = forecast
        .iter()
        .zip(actual)
        .take(n)
        .map(|(f, a)| (a - f).powi(2))
        .sum();
    (sum / n as f64).sqrt()
}

/// Mean absolute percentage error in percent; zero actuals are skipped
pub fn mean_absolute_percentage_error(forecast: &[f64], actual: &[f64]) -> f64 {
    let terms: Vec<f64> = forecast
        .iter()
        .zip(actual)
        .filter(|(_, a)| a.abs() > f64::EPSILON)
        .map(|(f, a)| (a - f).abs() / a.abs())
        .collect();
    if terms.is_empty() {
        return 0.0;
    }
    terms.iter().sum::<f64>() / terms.len() as f64 * 100.0
}

/// Two-sided standard normal quantile for a confidence level
const Z_TABLE: &[(f64, f64)] = &[
    (0.0, 0.0),
    (0.50, 0.674),
    (0.80, 1.282),
    (0.90, 1.645),
    (0.95, 1.960),
    (0.98, 2.326),
    (0.99, 2.576),
    (0.995, 2.807),
    (0.999, 3.291),
];

/// Critical value `z` such that `P(|Z| <= z) = confidence`, interpolated between
/// tabulated quantiles
pub fn z_score(confidence: f64) -> f64 {
    let confidence = confidence.clamp(0.0, 0.999);
    for window in Z_TABLE.windows(2) {
        let (c0, z0) = window[0];
        let (c1, z1) = window[1];
        if confidence <= c1 {
            let t = (confidence - c0) / (c1 - c0);
            return z0 + t * (z1 - z0);
        }
    }
    3.291
}
