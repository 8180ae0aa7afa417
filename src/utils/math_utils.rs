use statrs::function::gamma::ln_gamma;

lazy_static! {
    pub static ref LOG_ONE_HALF: f64 = (0.5 as f64).ln();
}

pub struct MathUtils {}

impl MathUtils {
    pub const LOG_ZERO: f64 = f64::NEG_INFINITY;

    /**
     * Exact log(exp(a) + exp(b)) in natural log space, computed in the
     * max-shift form so that neither operand underflows.
     */
    pub fn log_add_exact(a: f64, b: f64) -> f64 {
        if a == Self::LOG_ZERO {
            return b;
        }
        if b == Self::LOG_ZERO {
            return a;
        }
        if a > b {
            a + (1.0 + (b - a).exp()).ln()
        } else {
            b + (1.0 + (a - b).exp()).ln()
        }
    }

    /**
     * Log-sum-exp over a slice of natural log values. Returns LOG_ZERO for
     * an empty slice.
     */
    pub fn log_sum_exp(log_values: &[f64]) -> f64 {
        if log_values.is_empty() {
            return Self::LOG_ZERO;
        }

        let max_value = log_values.iter().cloned().fold(Self::LOG_ZERO, f64::max);
        if max_value == Self::LOG_ZERO {
            return max_value;
        }

        let sum_tot: f64 = log_values
            .iter()
            .filter(|v| **v != Self::LOG_ZERO)
            .map(|v| (v - max_value).exp())
            .sum();

        max_value + sum_tot.ln()
    }

    pub fn ln_binomial_coefficient(n: u64, k: u64) -> f64 {
        ln_gamma(n as f64 + 1.0) - ln_gamma(k as f64 + 1.0) - ln_gamma((n - k) as f64 + 1.0)
    }

    /**
     * Two sided tail probability of seeing a partition at least as skewed as
     * k-of-n under a fair binomial. Computed through the log binomial
     * coefficient so that depths beyond the exact integer range still work.
     */
    pub fn binomial_p_value(n: u64, k: u64) -> f64 {
        if n == 0 {
            return 1.0;
        }
        let k = if k < n / 2 { n - k } else { k };
        let ln_half_n = n as f64 * *LOG_ONE_HALF;
        let mut p = 0.0;
        for i in k..=n {
            p += (Self::ln_binomial_coefficient(n, i) + ln_half_n).exp();
        }
        p.min(1.0)
    }

    pub fn is_valid_log_probability(result: f64) -> bool {
        result <= 0.0
    }
}
