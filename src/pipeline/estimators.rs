//! Confidence interval estimators for summary rows.

/// Two-sided 95% normal quantile.
const Z_95: f64 = 1.959_963_984_540_054;

pub trait CiEstimator {
    fn name(&self) -> &'static str;

    /// `None` when the interval is undefined for this sample.
    fn interval(&self, values: &[f64]) -> Option<(f64, f64)>;
}

/// Mean plus or minus two standard errors of the mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalApprox;

impl CiEstimator for NormalApprox {
    fn name(&self) -> &'static str {
        "normal"
    }

    fn interval(&self, values: &[f64]) -> Option<(f64, f64)> {
        let mu = mean(values)?;
        let sem = standard_error(values)?;
        Some((mu - 2.0 * sem, mu + 2.0 * sem))
    }
}

/// Normal approximation to a binomial proportion, clipped to [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialNormal;

impl CiEstimator for BinomialNormal {
    fn name(&self) -> &'static str {
        "binomial-normal"
    }

    fn interval(&self, values: &[f64]) -> Option<(f64, f64)> {
        let (p, n) = proportion(values)?;
        let half = Z_95 * (p * (1.0 - p) / n).sqrt();
        Some(((p - half).max(0.0), (p + half).min(1.0)))
    }
}

/// Wilson score interval for a binomial proportion.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialWilson;

impl CiEstimator for BinomialWilson {
    fn name(&self) -> &'static str {
        "binomial-wilson"
    }

    fn interval(&self, values: &[f64]) -> Option<(f64, f64)> {
        let (p, n) = proportion(values)?;
        let z2 = Z_95 * Z_95;
        let denominator = 1.0 + z2 / n;
        let center = (p + z2 / (2.0 * n)) / denominator;
        let half = Z_95 * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denominator;
        Some(((center - half).max(0.0), (center + half).min(1.0)))
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation over sqrt(n); needs two observations.
pub fn standard_error(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mu = mean(values)?;
    let n = values.len() as f64;
    let variance = values
        .iter()
        .map(|value| (value - mu).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    Some((variance / n).sqrt())
}

/// Successes are the sum of 0/1 observations.
fn proportion(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    Some((values.iter().sum::<f64>() / n, n))
}
