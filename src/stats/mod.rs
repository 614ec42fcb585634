//! Statistical kernel: log-gamma, incomplete beta, and the binomial tail
//! probability used by the pair selector's asymmetry test.
//!
//! All functions are pure and re-entrant. Precondition violations are
//! programming errors and panic with a diagnostic; they cannot arise from
//! valid pipeline inputs.

use std::f64::consts::PI;

/// Lanczos-style series coefficients for `gamma_ln`.
const GAMMA_COEF: [f64; 6] = [
    76.18009173,
    -86.50532033,
    24.01409822,
    -1.231739516,
    0.120858003e-2,
    -0.536382e-5,
];

const BETA_CF_MAX_ITER: usize = 1000;
const BETA_CF_EPS: f64 = 3.0e-7;

/// Natural logarithm of the gamma function for `x > 0`.
///
/// Uses the 6-term series for `x >= 1` and the reflection formula
/// `gamma(x) = pi / (sin(pi z) * gamma(1 + z))` with `z = 1 - x` below 1.
///
/// # Panics
///
/// Panics when `x` is non-positive or absurdly large.
#[must_use]
pub fn gamma_ln(x: f64) -> f64 {
    assert!(x > 0.0, "gamma_ln argument must be positive, got {x}");
    assert!(x <= 1.0e302, "gamma_ln argument too large: {x}");
    if x == 0.5 {
        return PI.sqrt().ln();
    }
    if x < 1.0 {
        let z = 1.0 - x;
        return (z.ln() + PI.ln()) - (gamma_ln(1.0 + z) + (PI * z).sin().ln());
    }
    let mut xx = x - 1.0;
    let mut tmp = xx + 5.5;
    tmp -= (xx + 0.5) * tmp.ln();
    let mut ser = 1.0;
    for coef in GAMMA_COEF {
        xx += 1.0;
        ser += coef / xx;
    }
    (2.506_628_274_65 * ser).ln() - tmp
}

/// Continued-fraction evaluation for the incomplete beta function.
fn beta_cf(a: f64, b: f64, x: f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut bz = 1.0 - (qab * x / qap);
    let mut bm = 1.0;
    let mut az = 1.0;
    let mut am = 1.0;
    for i in 0..BETA_CF_MAX_ITER {
        let em = 1.0 + i as f64;
        let tem = em + em;
        let mut d = (em * (b - em) * x) / ((qam + tem) * (a + tem));
        let ap = az + d * am;
        let bp = bz + d * bm;
        d = (-(a + em) * (qab + em) * x) / ((qap + tem) * (a + tem));
        let app = ap + d * az;
        let bpp = bp + d * bz;
        let aold = az;
        am = ap / bpp;
        bm = bp / bpp;
        az = app / bpp;
        bz = 1.0;
        if (az - aold).abs() < BETA_CF_EPS * az.abs() {
            return az;
        }
    }
    panic!("beta_cf failed to converge for a = {a}, b = {b}");
}

/// Regularized incomplete beta function `I_x(a, b)` for `0 <= x <= 1`.
///
/// Switches continued-fraction branches at `x < (a + 1) / (a + b + 2)` to
/// keep the expansion convergent.
///
/// # Panics
///
/// Panics when `x` lies outside `[0, 1]`.
#[must_use]
pub fn beta_incomplete(a: f64, b: f64, x: f64) -> f64 {
    assert!(
        (0.0..=1.0).contains(&x),
        "beta_incomplete x must be in [0, 1], got {x}"
    );
    let bt = if x == 0.0 || x == 1.0 {
        0.0
    } else {
        (gamma_ln(a + b) - gamma_ln(a) - gamma_ln(b) + a * x.ln() + b * (1.0 - x).ln()).exp()
    };
    if x < (a + 1.0) / (a + b + 2.0) {
        bt * beta_cf(a, b, x) / a
    } else {
        1.0 - bt * beta_cf(b, a, 1.0 - x) / b
    }
}

/// Tail probability `P(X >= k)` for `X ~ Binomial(n, p)`.
///
/// `k = 0` trivially yields 1.0. Reduces to
/// `beta_incomplete(k, 1 + n - k, p)` otherwise.
///
/// # Panics
///
/// Panics when `k >= n`.
#[must_use]
pub fn binomial_tail(p: f64, n: usize, k: usize) -> f64 {
    assert!(k < n, "binomial_tail needs k < n, got k = {k}, n = {n}");
    if k == 0 {
        return 1.0;
    }
    beta_incomplete(k as f64, (1 + n - k) as f64, p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn gamma_ln_known_values() {
        assert_close(gamma_ln(1.0), 0.0, 1e-6);
        assert_close(gamma_ln(2.0), 0.0, 1e-6);
        assert_close(gamma_ln(6.0), 120.0_f64.ln(), 1e-6);
        // gamma(0.5) = sqrt(pi)
        assert_close(gamma_ln(0.5), PI.sqrt().ln(), 1e-9);
        // reflection branch
        assert_close(gamma_ln(0.25), 1.288_022_524_698_077, 1e-6);
    }

    #[test]
    #[should_panic(expected = "must be positive")]
    fn gamma_ln_rejects_non_positive() {
        let _ = gamma_ln(0.0);
    }

    #[test]
    fn beta_incomplete_endpoints() {
        assert_close(beta_incomplete(2.0, 3.0, 0.0), 0.0, 1e-12);
        assert_close(beta_incomplete(2.0, 3.0, 1.0), 1.0, 1e-12);
        // I_x(1, 1) is the identity
        assert_close(beta_incomplete(1.0, 1.0, 0.42), 0.42, 1e-7);
    }

    #[test]
    fn binomial_tail_matches_exact_sums() {
        // P(X >= k) computed directly from the mass function at p = 0.5
        for (n, k, expected) in [
            (2, 1, 0.75),
            (10, 9, 11.0 / 1024.0),
            (6, 3, 42.0 / 64.0),
            (10, 3, 968.0 / 1024.0),
        ] {
            let got = binomial_tail(0.5, n, k);
            assert!(
                (got - expected).abs() <= 1e-6,
                "P(X >= {k} | n = {n}): expected {expected}, got {got}"
            );
        }
    }

    #[test]
    fn binomial_tail_upper_edge() {
        // P(X >= n - 1) = (n + 1) * 0.5^n at p = 0.5
        for n in [2usize, 10, 50, 200] {
            let expected = (n as f64 + 1.0) * 0.5_f64.powi(n as i32);
            assert_close(binomial_tail(0.5, n, n - 1), expected, 1e-6);
        }
    }

    #[test]
    fn binomial_tail_zero_events() {
        assert_close(binomial_tail(0.5, 17, 0), 1.0, 0.0);
    }

    #[test]
    #[should_panic(expected = "k < n")]
    fn binomial_tail_rejects_k_at_n() {
        let _ = binomial_tail(0.5, 5, 5);
    }

    #[test]
    fn binomial_tail_asymmetry_threshold() {
        // the pair-selector use case: 300 vs 50 is wildly asymmetric,
        // 180 vs 170 is not
        assert!(binomial_tail(0.5, 350, 300) < 0.05);
        assert!(binomial_tail(0.5, 350, 180) > 0.05);
    }
}
