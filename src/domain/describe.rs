//! Descriptive statistics for a sample of values.
//!
//! Mirrors the usual eight-line summary: count, mean, sample standard
//! deviation (n - 1 denominator), min, quartiles by linear interpolation
//! between closest ranks, and max. Statistics that need more data than
//! given are NaN rather than zero.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Description {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl Description {
    pub fn compute(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Description {
                count: 0,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                p25: f64::NAN,
                p50: f64::NAN,
                p75: f64::NAN,
                max: f64::NAN,
            };
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;

        let std = if count < 2 {
            f64::NAN
        } else {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        };

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Description {
            count,
            mean,
            std,
            min: sorted[0],
            p25: percentile(&sorted, 0.25),
            p50: percentile(&sorted, 0.50),
            p75: percentile(&sorted, 0.75),
            max: sorted[count - 1],
        }
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "count  {:>12}", self.count)?;
        writeln!(f, "mean   {:>12.6}", self.mean)?;
        writeln!(f, "std    {:>12.6}", self.std)?;
        writeln!(f, "min    {:>12.6}", self.min)?;
        writeln!(f, "25%    {:>12.6}", self.p25)?;
        writeln!(f, "50%    {:>12.6}", self.p50)?;
        writeln!(f, "75%    {:>12.6}", self.p75)?;
        write!(f, "max    {:>12.6}", self.max)
    }
}
