use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::analysis::AnalysisError;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TTestOutcome {
    pub t_statistic: f64,
    pub p_value: f64,
    pub cohens_d: f64,
}

/// Independent two-sample t-test with pooled variance, plus the matching
/// standardized mean difference. Degenerate inputs (a group below two
/// observations, zero pooled variance) produce a named error instead of a
/// NaN statistic.
pub fn pooled_t_test(
    metric: &'static str,
    group_a: &[f64],
    group_b: &[f64],
) -> Result<TTestOutcome, AnalysisError> {
    let n_a = group_a.len();
    let n_b = group_b.len();
    if n_a < 2 || n_b < 2 {
        return Err(AnalysisError::DegenerateSample {
            metric,
            reason: format!("need at least 2 observations per group, got {n_a} and {n_b}"),
        });
    }

    let mean_a = mean(group_a);
    let mean_b = mean(group_b);
    let var_a = sample_variance(group_a, mean_a);
    let var_b = sample_variance(group_b, mean_b);

    let freedom = (n_a + n_b - 2) as f64;
    let pooled_variance = ((n_a - 1) as f64 * var_a + (n_b - 1) as f64 * var_b) / freedom;
    if pooled_variance <= 0.0 {
        return Err(AnalysisError::DegenerateSample {
            metric,
            reason: "zero variance in both groups".to_string(),
        });
    }

    let standard_error =
        (pooled_variance * (1.0 / n_a as f64 + 1.0 / n_b as f64)).sqrt();
    let t_statistic = (mean_a - mean_b) / standard_error;

    let distribution =
        StudentsT::new(0.0, 1.0, freedom).map_err(|err| AnalysisError::DegenerateSample {
            metric,
            reason: err.to_string(),
        })?;
    let p_value = 2.0 * (1.0 - distribution.cdf(t_statistic.abs()));

    let cohens_d = (mean_a - mean_b) / pooled_variance.sqrt();

    Ok(TTestOutcome {
        t_statistic,
        p_value,
        cohens_d,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased (ddof = 1) sample variance.
fn sample_variance(values: &[f64], mean: f64) -> f64 {
    let sum_squares: f64 = values.iter().map(|value| (value - mean).powi(2)).sum();
    sum_squares / (values.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_the_pooled_t_statistic() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [3.0, 4.0, 5.0, 6.0];
        let outcome = pooled_t_test("test", &a, &b).expect("t-test failed");

        // hand-computed: means 2.5 / 4.5, pooled variance 5/3, se = sqrt(5/6)
        assert!((outcome.t_statistic + 2.190890).abs() < 1e-5);
        assert!((outcome.cohens_d + 1.549193).abs() < 1e-5);
        assert!(outcome.p_value > 0.05 && outcome.p_value < 0.12);
    }

    #[test]
    fn clearly_separated_groups_are_significant() {
        let a: Vec<f64> = (0..40).map(|i| 100.0 + (i % 5) as f64).collect();
        let b: Vec<f64> = (0..40).map(|i| 10.0 + (i % 5) as f64).collect();
        let outcome = pooled_t_test("test", &a, &b).expect("t-test failed");
        assert!(outcome.t_statistic > 0.0);
        assert!(outcome.p_value < 0.05);
    }

    #[test]
    fn tiny_groups_are_rejected() {
        let err = pooled_t_test("test", &[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::DegenerateSample { .. }));
    }

    #[test]
    fn zero_variance_is_rejected() {
        let a = [5.0, 5.0, 5.0];
        let b = [5.0, 5.0, 5.0];
        let err = pooled_t_test("test", &a, &b).unwrap_err();
        assert!(matches!(err, AnalysisError::DegenerateSample { .. }));
    }
}
