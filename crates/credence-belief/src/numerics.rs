//! Special functions behind the belief models.
//!
//! Log-domain binomial and beta-binomial probability mass functions. The
//! beta-binomial form goes through a log-gamma ratio so that large shape
//! parameters never evaluate a beta function directly.
//!
//! # References
//!
//! - Lanczos 1964, Godfrey coefficients (g = 7, n = 9)
//! - Stirling series for the log-gamma remainder γ*(a)

use std::f64::consts::PI;

use credence_common::{CredenceError, Result};

/// ½·ln(2π)
const HALF_LN_2PI: f64 = 0.918_938_533_204_672_8;

/// Above this the Stirling remainder is zero in double precision.
const GAMMA_STAR_CUTOFF: f64 = 1e9;

/// Lanczos approximation for ln|Γ(x)|, g = 7, n = 9 coefficients.
///
/// Uses reflection for `x < 0.5`. Returns `f64::INFINITY` at the poles
/// (zero and the negative integers).
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 && x.fract() == 0.0 {
        return f64::INFINITY;
    }
    if x < 0.5 {
        // Γ(x)Γ(1-x) = π / sin(πx)
        return (PI / (PI * x).sin().abs()).ln() - ln_gamma(1.0 - x);
    }

    let z = x - 1.0;
    let mut sum = COEFFS[0];
    for (i, &c) in COEFFS.iter().enumerate().skip(1) {
        sum += c / (z + i as f64);
    }
    let t = z + G + 0.5;
    HALF_LN_2PI + (z + 0.5) * t.ln() - t + sum.ln()
}

/// ln C(n, k). Exactly symmetric under `k -> n - k`; `-inf` for `k > n`.
#[must_use]
pub fn log_binomial_coefficient(n: u32, k: u32) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    let n = f64::from(n);
    let k = f64::from(k);
    ln_gamma(n + 1.0) - (ln_gamma(k + 1.0) + ln_gamma(n - k + 1.0))
}

/// ln P(K = k) for K ~ Binomial(n, p).
///
/// A boundary `p` that agrees with the count gives `0.0`; one that
/// contradicts it is a [`CredenceError::NumericalDegeneracy`].
pub fn binomial_log_pmf(k: u32, n: u32, p: f64) -> Result<f64> {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return Err(CredenceError::InvalidParameters {
            model: "binomial".to_string(),
            params: vec![p],
            reason: "p must lie in [0, 1]".to_string(),
        });
    }
    if k > n {
        return Err(CredenceError::InvalidCount { k, n });
    }
    if p == 0.0 || p == 1.0 {
        let consistent = (p == 0.0 && k == 0) || (p == 1.0 && k == n);
        return if consistent {
            Ok(0.0)
        } else {
            Err(CredenceError::NumericalDegeneracy {
                context: format!("binomial probability of {k} of {n} is zero at p = {p}"),
                params: vec![p],
            })
        };
    }
    let kf = f64::from(k);
    let n_minus_k = f64::from(n - k);
    Ok(log_binomial_coefficient(n, k) + kf * p.ln() + n_minus_k * (-p).ln_1p())
}

/// P(K = k) for K ~ Binomial(n, p). Zero where the log form is degenerate.
pub fn binomial_pmf(k: u32, n: u32, p: f64) -> Result<f64> {
    match binomial_log_pmf(k, n, p) {
        Ok(lp) => Ok(lp.exp()),
        Err(CredenceError::NumericalDegeneracy { .. }) => Ok(0.0),
        Err(e) => Err(e),
    }
}

/// Stirling remainder γ*(a) = lnΓ(a) + a - ½ln2π - (a - ½)ln a.
fn log_gamma_star(a: f64) -> f64 {
    if a == 0.0 {
        return f64::INFINITY;
    }
    if a > GAMMA_STAR_CUTOFF {
        return 0.0;
    }
    if a >= 10.0 {
        let inv = 1.0 / a;
        let inv2 = inv * inv;
        return inv * (1.0 / 12.0 - inv2 * (1.0 / 360.0 - inv2 * (1.0 / 1260.0 - inv2 / 1680.0)));
    }
    ln_gamma(a) + a - HALF_LN_2PI - (a - 0.5) * a.ln()
}

fn log_q(z: f64, n: f64) -> f64 {
    let r = n / z;
    (n - 0.5) * r.ln_1p() + z * (r.ln_1p() - r)
}

/// lnΓ(z + n) - lnΓ(z), accurate when both arguments are large.
#[must_use]
pub fn log_gamma_ratio(z: f64, n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    n * z.ln() + log_gamma_star(z + n) - log_gamma_star(z) + log_q(z, n)
}

/// ln P(K = k) for K ~ BetaBinomial(n, α, β).
pub fn beta_binomial_log_pmf(k: u32, n: u32, alpha: f64, beta: f64) -> Result<f64> {
    let valid = |x: f64| x.is_finite() && x > 0.0;
    if !valid(alpha) || !valid(beta) {
        return Err(CredenceError::InvalidParameters {
            model: "beta_binomial".to_string(),
            params: vec![alpha, beta],
            reason: "Alpha and Beta must be finite and positive".to_string(),
        });
    }
    if k > n {
        return Err(CredenceError::InvalidCount { k, n });
    }
    let kf = f64::from(k);
    let nf = f64::from(n);
    Ok(log_binomial_coefficient(n, k) + log_gamma_ratio(alpha, kf) + log_gamma_ratio(beta, nf - kf)
        - log_gamma_ratio(alpha + beta, nf))
}

pub fn beta_binomial_pmf(k: u32, n: u32, alpha: f64, beta: f64) -> Result<f64> {
    Ok(beta_binomial_log_pmf(k, n, alpha, beta)?.exp())
}

/// ln(1 - eˣ) for `x <= 0`, stable at both ends.
#[must_use]
pub fn log1m_exp(x: f64) -> f64 {
    if x > 0.0 || x.is_nan() {
        f64::NAN
    } else if x > -std::f64::consts::LN_2 {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// C(n, k)·pᵏ·(1-p)ⁿ⁻ᵏ by direct multiplication, `None` where it underflows.
    fn direct_binomial(k: u32, n: u32, p: f64) -> Option<f64> {
        let small = k.min(n - k);
        let mut c = 1.0f64;
        for i in 0..small {
            c = c * f64::from(n - i) / f64::from(i + 1);
        }
        let pk = p.powi(k as i32);
        let qk = (1.0 - p).powi((n - k) as i32);
        let value = c * pk * qk;
        (pk > 1e-280 && qk > 1e-280 && value > 1e-280).then_some(value)
    }

    #[test]
    fn ln_gamma_known_values() {
        assert!(ln_gamma(1.0).abs() < 1e-13);
        assert!(ln_gamma(2.0).abs() < 1e-13);
        assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-13, "Γ(5) = 4! = 24");
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-13, "Γ(0.5) = √π");
        // Γ(-0.5) = -2√π
        assert!((ln_gamma(-0.5) - (2.0 * PI.sqrt()).ln()).abs() < 1e-12);
        let ln_fact_20 = (1..=20u32).map(|i| f64::from(i).ln()).sum::<f64>();
        assert!((ln_gamma(21.0) - ln_fact_20).abs() < 1e-11);
    }

    #[test]
    fn ln_gamma_poles() {
        assert!(ln_gamma(0.0).is_infinite());
        assert!(ln_gamma(-3.0).is_infinite());
    }

    #[test]
    fn binomial_coefficient_symmetry() {
        for n in [0u32, 1, 7, 40, 500] {
            for k in 0..=n {
                assert_eq!(log_binomial_coefficient(n, k), log_binomial_coefficient(n, n - k));
            }
        }
        assert_eq!(log_binomial_coefficient(3, 4), f64::NEG_INFINITY);
        assert!((log_binomial_coefficient(10, 3) - 120.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn binomial_log_pmf_matches_direct_computation() {
        for p in [0.01, 0.5, 0.99] {
            for n in 0..=500u32 {
                for k in 0..=n {
                    let Some(expected) = direct_binomial(k, n, p) else { continue };
                    let got = binomial_log_pmf(k, n, p).unwrap().exp();
                    let rel = ((got - expected) / expected).abs();
                    assert!(rel < 1e-9, "k={k} n={n} p={p}: {got} vs {expected}");
                }
            }
        }
    }

    #[test]
    fn binomial_boundaries() {
        // Interior p never raises at the extreme counts
        for n in [1u32, 5, 50] {
            assert!(binomial_log_pmf(0, n, 0.3).unwrap().is_finite());
            assert!(binomial_log_pmf(n, n, 0.3).unwrap().is_finite());
        }
        assert_eq!(binomial_log_pmf(0, 4, 0.0).unwrap(), 0.0);
        assert_eq!(binomial_log_pmf(4, 4, 1.0).unwrap(), 0.0);
        assert!(matches!(
            binomial_log_pmf(1, 4, 0.0),
            Err(CredenceError::NumericalDegeneracy { .. })
        ));
        assert!(matches!(
            binomial_log_pmf(3, 4, 1.0),
            Err(CredenceError::NumericalDegeneracy { .. })
        ));
        assert_eq!(binomial_pmf(3, 4, 1.0).unwrap(), 0.0);
        assert!(matches!(
            binomial_log_pmf(1, 4, 1.5),
            Err(CredenceError::InvalidParameters { .. })
        ));
        assert!(binomial_log_pmf(1, 4, f64::NAN).is_err());
        assert!(matches!(
            binomial_log_pmf(5, 4, 0.5),
            Err(CredenceError::InvalidCount { k: 5, n: 4 })
        ));
    }

    #[test]
    fn log_gamma_ratio_matches_difference() {
        for z in [0.3, 1.0, 2.5, 9.0, 12.0, 150.0] {
            for n in [1.0, 3.0, 10.0] {
                let expected = ln_gamma(z + n) - ln_gamma(z);
                let got = log_gamma_ratio(z, n);
                assert!((got - expected).abs() < 1e-9, "z={z} n={n}: {got} vs {expected}");
            }
        }
        assert_eq!(log_gamma_ratio(4.0, 0.0), 0.0);
    }

    #[test]
    fn beta_binomial_normalises() {
        for alpha in [0.1, 0.5, 1.0, 2.0, 10.0, 100.0] {
            for beta in [0.1, 0.5, 1.0, 2.0, 10.0, 100.0] {
                for n in 1..=10u32 {
                    let total: f64 = (0..=n)
                        .map(|k| beta_binomial_pmf(k, n, alpha, beta).unwrap())
                        .sum();
                    assert!((total - 1.0).abs() < 1e-6, "a={alpha} b={beta} n={n}: {total}");
                }
            }
        }
    }

    #[test]
    fn beta_binomial_uniform_case() {
        // Alpha = Beta = 1 makes every k equally likely
        for k in 0..=6 {
            let p = beta_binomial_pmf(k, 6, 1.0, 1.0).unwrap();
            assert!((p - 1.0 / 7.0).abs() < 1e-10);
        }
    }

    #[test]
    fn beta_binomial_finite_over_wide_range() {
        for alpha in [1e-3, 1e-1, 1.0, 1e2, 1e3] {
            for beta in [1e-3, 1e-1, 1.0, 1e2, 1e3] {
                for n in 0..=10u32 {
                    for k in 0..=n {
                        let lp = beta_binomial_log_pmf(k, n, alpha, beta).unwrap();
                        assert!(lp.is_finite(), "a={alpha} b={beta} k={k} n={n}");
                    }
                }
            }
        }
        assert!(beta_binomial_log_pmf(0, 3, 0.0, 1.0).is_err());
        assert!(beta_binomial_log_pmf(0, 3, 1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn log1m_exp_stable() {
        assert_eq!(log1m_exp(0.0), f64::NEG_INFINITY);
        assert!((log1m_exp(-1e-10) - (1e-10f64).ln()).abs() < 1e-6);
        assert!((log1m_exp(-50.0) + (-50.0f64).exp()).abs() < 1e-30);
        assert!((log1m_exp((0.5f64).ln()) - (0.5f64).ln()).abs() < 1e-14);
        assert!(log1m_exp(0.1).is_nan());
    }
}
