//! Complex special functions for the wave-optics amplification factor.

use std::f64::consts::PI;
use std::ops::{Add, Mul, Neg, Sub};

use num_complex::Complex64;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Unit roundoff of the double-double accumulation in [`hyp1f1_series`].
pub const SERIES_EPSILON: f64 = f64::EPSILON * f64::EPSILON;

/// Logarithm of the gamma function for complex arguments (Lanczos, g = 7).
///
/// The imaginary part is only defined modulo `2 pi`.
pub fn ln_gamma(z: Complex64) -> Complex64 {
    if z.re < 0.5 {
        // Reflection: Gamma(z) Gamma(1 - z) = pi / sin(pi z)
        return Complex64::new(PI.ln(), 0.0) - ln_sin_pi(z) - ln_gamma(1.0 - z);
    }

    let z = z - 1.0;
    let mut x = Complex64::new(LANCZOS_COEFFS[0], 0.0);
    for (idx, &coeff) in LANCZOS_COEFFS.iter().enumerate().skip(1) {
        x += coeff / (z + idx as f64);
    }

    let t = z + LANCZOS_G + 0.5;
    0.5 * (2.0 * PI).ln() + (z + 0.5) * t.ln() - t + x.ln()
}

/// `ln(sin(pi z))`, finite far from the real axis where `sin` overflows.
fn ln_sin_pi(z: Complex64) -> Complex64 {
    let i = Complex64::new(0.0, 1.0);

    if z.im.abs() < 16.0 {
        return (z * PI).sin().ln();
    }

    if z.im > 0.0 {
        // sin(pi z) = (i / 2) exp(-i pi z) (1 - exp(2 i pi z))
        -i * PI * z + (0.5 * i).ln() + (1.0 - (2.0 * PI * i * z).exp()).ln()
    } else {
        // sin(pi z) = (-i / 2) exp(i pi z) (1 - exp(-2 i pi z))
        i * PI * z + (-0.5 * i).ln() + (1.0 - (-2.0 * PI * i * z).exp()).ln()
    }
}

fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    (s, (a - (s - bb)) + (b - bb))
}

fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    (s, b - (s - a))
}

fn two_prod(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    (p, a.mul_add(b, -p))
}

/// Unevaluated sum `hi + lo` with `|lo| <= ulp(hi) / 2`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct DoubleDouble {
    hi: f64,
    lo: f64,
}

impl DoubleDouble {
    fn from_f64(value: f64) -> Self {
        Self { hi: value, lo: 0.0 }
    }

    fn from_parts((hi, lo): (f64, f64)) -> Self {
        let (hi, lo) = quick_two_sum(hi, lo);
        Self { hi, lo }
    }

    fn div_f64(self, rhs: f64) -> Self {
        let q1 = self.hi / rhs;
        let r = self - Self::from_parts(two_prod(q1, rhs));
        let q2 = r.hi / rhs;
        let r = r - Self::from_parts(two_prod(q2, rhs));
        let q3 = r.hi / rhs;
        Self::from_parts(quick_two_sum(q1, q2)) + Self::from_f64(q3)
    }
}

impl Add for DoubleDouble {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let (s, e) = two_sum(self.hi, rhs.hi);
        let (t, f) = two_sum(self.lo, rhs.lo);
        let (s, e) = quick_two_sum(s, e + t);
        Self::from_parts((s, e + f))
    }
}

impl Neg for DoubleDouble {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            hi: -self.hi,
            lo: -self.lo,
        }
    }
}

impl Sub for DoubleDouble {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for DoubleDouble {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let (p, e) = two_prod(self.hi, rhs.hi);
        Self::from_parts((p, e + (self.hi * rhs.lo + self.lo * rhs.hi)))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct ComplexDd {
    re: DoubleDouble,
    im: DoubleDouble,
}

impl ComplexDd {
    fn new(re: DoubleDouble, im: DoubleDouble) -> Self {
        Self { re, im }
    }

    fn from_complex(value: Complex64) -> Self {
        Self::new(DoubleDouble::from_f64(value.re), DoubleDouble::from_f64(value.im))
    }

    fn to_complex(self) -> Complex64 {
        Complex64::new(self.re.hi + self.re.lo, self.im.hi + self.im.lo)
    }

    fn norm(self) -> f64 {
        self.re.hi.hypot(self.im.hi)
    }

    fn div_f64(self, rhs: f64) -> Self {
        Self::new(self.re.div_f64(rhs), self.im.div_f64(rhs))
    }
}

impl Add for ComplexDd {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Mul for ComplexDd {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Confluent hypergeometric function `1F1(a; b; z)` by its power series,
/// accumulated in double-double arithmetic.
///
/// Returns `None` when the series does not converge within `max_terms`, when
/// a term overflows, or once a term exceeds `abort_above`. Cancellation
/// leaves an absolute error of roughly `SERIES_EPSILON` times the largest
/// term, so callers derive `abort_above` from that.
pub fn hyp1f1_series(
    a: Complex64,
    b: f64,
    z: Complex64,
    max_terms: usize,
    abort_above: f64,
) -> Option<Complex64> {
    let z_dd = ComplexDd::from_complex(z);
    let mut term = ComplexDd::from_complex(Complex64::new(1.0, 0.0));
    let mut sum = term;
    let mut small_in_a_row = 0_u8;

    for n in 0..max_terms {
        let k = n as f64;
        let a_k = ComplexDd::new(
            DoubleDouble::from_f64(a.re) + DoubleDouble::from_f64(k),
            DoubleDouble::from_f64(a.im),
        );
        term = (term * a_k * z_dd).div_f64(b + k).div_f64(k + 1.0);
        sum = sum + term;

        let magnitude = term.norm();
        if !magnitude.is_finite() || magnitude > abort_above {
            return None;
        }

        let shrinking = ((a + k + 1.0) * z).norm() < ((b + k + 1.0) * (k + 2.0)).abs();
        if shrinking && magnitude <= f64::EPSILON * 0.25 * sum.norm() {
            small_in_a_row += 1;
            if small_in_a_row >= 2 {
                return Some(sum.to_complex());
            }
        } else {
            small_in_a_row = 0;
        }
    }

    None
}

/// Asymptotic tail `sum_s (p)_s^2 / s! x^-s` of Kummer's function at large
/// `|x|`, cut at its smallest term.
///
/// Returns the partial sum and the modulus of the last term kept, which
/// bounds the truncation error.
pub fn kummer_asymptotic_tail(p: Complex64, x: Complex64, max_terms: usize) -> (Complex64, f64) {
    let mut term = Complex64::new(1.0, 0.0);
    let mut sum = term;
    let mut last = 1.0_f64;

    for n in 0..max_terms {
        let k = n as f64;
        term *= (p + k) * (p + k) / ((k + 1.0) * x);

        let magnitude = term.norm();
        if magnitude.is_nan() || magnitude >= last {
            return (sum, last);
        }

        sum += term;
        last = magnitude;
        if magnitude <= f64::EPSILON * sum.norm() {
            break;
        }
    }

    (sum, last)
}
