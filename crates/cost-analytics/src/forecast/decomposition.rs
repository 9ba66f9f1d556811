//! Classical additive seasonal decomposition

use super::types::SeasonalDecomposition;

/// Decompose `values` with cycle length `period`.
///
/// Requires at least two full cycles; returns `None` otherwise.
pub fn decompose(values: &[f64], period: usize) -> Option<SeasonalDecomposition> {
    let n = values.len();
    if period < 2 || n < 2 * period {
        return None;
    }

    let trend = centered_moving_average(values, period);

    let mut phase_sums = vec![0.0; period];
    let mut phase_counts = vec![0usize; period];
    for (i, (value, t)) in values.iter().zip(&trend).enumerate() {
        if let Some(t) = t {
            phase_sums[i % period] += value - t;
            phase_counts[i % period] += 1;
        }
    }

    let mut seasonal: Vec<f64> = phase_sums
        .iter()
        .zip(&phase_counts)
        .map(|(sum, count)| if *count > 0 { sum / *count as f64 } else { 0.0 })
        .collect();
    let offset = seasonal.iter().sum::<f64>() / period as f64;
    for s in &mut seasonal {
        *s -= offset;
    }

    let residual = values
        .iter()
        .zip(&trend)
        .enumerate()
        .map(|(i, (value, t))| t.map(|t| value - t - seasonal[i % period]))
        .collect();

    Some(SeasonalDecomposition {
        period,
        trend,
        seasonal,
        residual,
    })
}

/// Centered moving average; even periods use the 2×period weighting
fn centered_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = period / 2;
    let mut trend = vec![None; n];

    for (i, slot) in trend.iter_mut().enumerate().take(n - half).skip(half) {
        let value = if period % 2 == 1 {
            values[i - half..=i + half].iter().sum::<f64>() / period as f64
        } else {
            let inner: f64 = values[i - half + 1..i + half].iter().sum();
            (0.5 * values[i - half] + inner + 0.5 * values[i + half]) / period as f64
        };
        *slot = Some(value);
    }
    trend
}
