//! Special functions behind the exposure quantiles.

use std::f64::consts::PI;

/// Euler–Mascheroni constant
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

const EPSILON: f64 = 1e-15;
const TINY: f64 = 1e-300;
const MAX_ITERATIONS: usize = 500;

/// Natural log of the gamma function (Lanczos approximation)
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEFFICIENTS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEFFICIENTS[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// Regularized lower incomplete gamma function P(a, x)
#[must_use]
pub fn regularized_gamma_p(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let prefactor = (-x + a * x.ln() - ln_gamma(a)).exp();
    if x < a + 1.0 {
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut denominator = a;
        for _ in 0..MAX_ITERATIONS {
            denominator += 1.0;
            term *= x / denominator;
            sum += term;
            if term.abs() < sum.abs() * EPSILON {
                break;
            }
        }
        (sum * prefactor).clamp(0.0, 1.0)
    } else {
        // Modified Lentz evaluation of the continued fraction for Q(a, x)
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / TINY;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..MAX_ITERATIONS {
            let i = i as f64;
            let an = -i * (i - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < TINY {
                d = TINY;
            }
            c = b + an / c;
            if c.abs() < TINY {
                c = TINY;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < EPSILON {
                break;
            }
        }
        (1.0 - prefactor * h).clamp(0.0, 1.0)
    }
}

/// Gamma distribution CDF with the given shape and scale
#[must_use]
pub fn gamma_cdf(x: f64, shape: f64, scale: f64) -> f64 {
    regularized_gamma_p(shape, x / scale)
}

/// Gamma distribution quantile with the given shape and scale
///
/// `p` must lie in the open interval (0, 1); the endpoints map to 0 and
/// infinity.
#[must_use]
pub fn gamma_ppf(p: f64, shape: f64, scale: f64) -> f64 {
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    standard_gamma_ppf(p, shape) * scale
}

fn standard_gamma_ppf(p: f64, shape: f64) -> f64 {
    let ln_gamma_shape = ln_gamma(shape);
    let density = |x: f64| ((shape - 1.0) * x.ln() - x - ln_gamma_shape).exp();

    // Wilson–Hilferty starting point
    let nine_k = 9.0 * shape;
    let cube = 1.0 - 1.0 / nine_k + normal_ppf(p) * (1.0 / nine_k).sqrt();
    let mut x = if cube > 0.0 {
        shape * cube.powi(3)
    } else {
        ((p.ln() + ln_gamma(shape + 1.0)) / shape).exp()
    };

    let mut low = 0.0;
    let mut high = x.max(1.0);
    let mut expansions = 0;
    while regularized_gamma_p(shape, high) < p && expansions < 1_000 {
        low = high;
        high *= 2.0;
        expansions += 1;
    }
    if !(x > low && x < high) {
        x = 0.5 * (low + high);
    }

    for _ in 0..MAX_ITERATIONS {
        let residual = regularized_gamma_p(shape, x) - p;
        if residual.abs() < 1e-14 {
            break;
        }
        if residual < 0.0 {
            low = x;
        } else {
            high = x;
        }
        let slope = density(x);
        let newton = x - residual / slope;
        x = if slope > 0.0 && newton.is_finite() && newton > low && newton < high {
            newton
        } else {
            0.5 * (low + high)
        };
        if high - low <= 1e-13 * x.max(1e-300) {
            break;
        }
    }
    x
}

/// Gumbel (maximum) distribution quantile
#[must_use]
pub fn gumbel_ppf(p: f64, location: f64, scale: f64) -> f64 {
    location - scale * (-p.ln()).ln()
}

/// Standard normal quantile (Acklam's rational approximation)
#[must_use]
pub fn normal_ppf(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ln_gamma_matches_factorials() {
        assert!(ln_gamma(1.0).abs() < 1e-12);
        assert!((ln_gamma(5.0) - 24f64.ln()).abs() < 1e-10);
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-10);
    }

    #[test]
    fn test_exponential_special_case() {
        // Shape 1 is the exponential distribution
        for p in [0.01, 0.25, 0.5, 0.9, 0.999] {
            let expected = -(1.0_f64 - p).ln() * 2.0;
            assert!((gamma_ppf(p, 1.0, 2.0) - expected).abs() < 1e-8, "p = {p}");
        }
    }

    #[test]
    fn test_gamma_ppf_inverts_cdf() {
        for shape in [0.5, 2.0, 64.0, 400.0] {
            for p in [0.001, 0.1, 0.5, 0.9, 0.999] {
                let x = gamma_ppf(p, shape, 1.5);
                assert!(x.is_finite() && x > 0.0);
                assert!((gamma_cdf(x, shape, 1.5) - p).abs() < 1e-9, "shape {shape}, p {p}");
            }
        }
    }

    #[test]
    fn test_normal_ppf_known_values() {
        assert!(normal_ppf(0.5).abs() < 1e-9);
        assert!((normal_ppf(0.975) - 1.959_964).abs() < 1e-5);
        assert!((normal_ppf(0.01) + 2.326_348).abs() < 1e-5);
    }

    #[test]
    fn test_gumbel_median() {
        let median = gumbel_ppf(0.5, 10.0, 2.0);
        assert!((median - (10.0 - 2.0 * 2f64.ln().ln())).abs() < 1e-12);
    }
}
