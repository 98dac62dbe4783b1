use num_complex::Complex64;

pub const J: Complex64 = Complex64 { re: 0.0, im: 1.0 };

/// Magnitudes at or below this are treated as zero (breaker taps, empty
/// admittances).
pub const EPSILON: f64 = 1e-12;

#[macro_export]
macro_rules! cmplx {
    () => {
        num_complex::Complex64::new(0.0, 0.0)
    };
    ($arg1:expr) => {
        num_complex::Complex64::new($arg1, 0.0)
    };
    ($arg1:expr, $arg2:expr) => {
        num_complex::Complex64::new($arg1, $arg2)
    };
}

/// Returns `z` scaled to magnitude `vm`, keeping its angle. A zero `z`
/// yields `vm` at angle zero.
pub fn with_magnitude(z: Complex64, vm: f64) -> Complex64 {
    if z.norm() <= EPSILON {
        Complex64::new(vm, 0.0)
    } else {
        Complex64::from_polar(vm, z.arg())
    }
}

/// Largest absolute value in `x`, zero for an empty slice. NaN entries
/// propagate.
pub fn norm_inf(x: &[f64]) -> f64 {
    x.iter().fold(0.0_f64, |m, v| {
        if v.is_nan() || m.is_nan() {
            f64::NAN
        } else {
            m.max(v.abs())
        }
    })
}

/// True when `a` and `b` are within `tol` of each other.
#[cfg(test)]
pub(crate) fn near(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}
