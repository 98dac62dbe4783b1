use crate::dense::Mat;
use num_complex::Complex64;
use pretty_dtoa::{dtoa, FmtFloatConfig};

const FLOAT_CONFIG: FmtFloatConfig = FmtFloatConfig::default()
    .add_point_zero(false)
    .max_significant_digits(9);

pub fn format_f64_vec(v: &[f64]) -> String {
    let a: Vec<String> = v.iter().map(|f| dtoa(*f, FLOAT_CONFIG)).collect();
    format!("[{}]", a.join(", "))
}

pub fn format_complex(z: &Complex64) -> String {
    format!(
        "{}{}j{}",
        dtoa(z.re, FLOAT_CONFIG),
        if z.im.signum() < 0.0 { "-" } else { "+" },
        dtoa(z.im.abs(), FLOAT_CONFIG)
    )
}

pub fn format_rect_vec(v: &[Complex64]) -> String {
    let a: Vec<String> = v.iter().map(format_complex).collect();
    format!("[{}]", a.join(", "))
}

pub fn format_polar(z: &Complex64) -> String {
    format!(
        "{}\u{2220}{}\u{00B0}",
        dtoa(z.norm(), FLOAT_CONFIG),
        dtoa(z.arg().to_degrees(), FLOAT_CONFIG)
    )
}

pub fn format_polar_vec(v: &[Complex64]) -> String {
    let a: Vec<String> = v.iter().map(format_polar).collect();
    format!("[{}]", a.join(", "))
}

/// Renders a real matrix one row per line, for trace logging.
pub fn format_f64_mat(m: &Mat<f64>) -> String {
    (0..m.rows())
        .map(|i| format_f64_vec(m.row(i)))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Renders a complex matrix one row per line, for trace logging.
pub fn format_rect_mat(m: &Mat<Complex64>) -> String {
    (0..m.rows())
        .map(|i| format_rect_vec(m.row(i)))
        .collect::<Vec<String>>()
        .join("\n")
}
