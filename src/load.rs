use crate::node::Node;
use num_complex::Complex64;

/// Voltage-dependent load. Called once per Newton iteration for each node
/// that carries a model; it rewrites `node.load` from the node's present
/// voltage.
pub trait LoadModel: Send + Sync {
    fn apply(&self, node: &mut Node);
}

impl<F> LoadModel for F
where
    F: Fn(&mut Node) + Send + Sync,
{
    fn apply(&self, node: &mut Node) {
        self(node)
    }
}

/// Static ZIP load: the constant impedance, current and power fractions of
/// the nominal power `s0` (consumed at nominal voltage).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zip {
    pub s0: Complex64,
    /// Fractions `[p, i, z]` for the active part.
    pub pw: [f64; 3],
    /// Fractions `[p, i, z]` for the reactive part.
    pub qw: [f64; 3],
}

impl Zip {
    /// Consumed power at voltage magnitude ratio `u = |U| / |Un|`.
    pub fn power(&self, u: f64) -> Complex64 {
        let p = self.s0.re * (self.pw[0] + self.pw[1] * u + self.pw[2] * u * u);
        let q = self.s0.im * (self.qw[0] + self.qw[1] * u + self.qw[2] * u * u);
        Complex64::new(p, q)
    }
}

/// Load that switches between static models by voltage range.
///
/// Each entry covers magnitude ratios `[u_min, u_max)` relative to nominal.
/// Outside every range the nearest one applies.
#[derive(Debug, Clone, Default)]
pub struct CompositeLoad {
    ranges: Vec<(f64, f64, Zip)>,
}

impl CompositeLoad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, u_min: f64, u_max: f64, model: Zip) -> Self {
        self.ranges.push((u_min, u_max, model));
        self.ranges.sort_by(|a, b| a.0.total_cmp(&b.0));
        self
    }

    fn model_at(&self, u: f64) -> Option<&Zip> {
        let distance = |(lo, hi, _): &&(f64, f64, Zip)| if u < *lo { lo - u } else { u - hi };
        self.ranges
            .iter()
            .find(|(lo, hi, _)| u >= *lo && u < *hi)
            .or_else(|| {
                self.ranges
                    .iter()
                    .min_by(|a, b| distance(a).total_cmp(&distance(b)))
            })
            .map(|(_, _, m)| m)
    }
}

impl LoadModel for CompositeLoad {
    fn apply(&self, node: &mut Node) {
        let un = node.nominal_voltage.norm();
        let u = match node.voltage {
            Some(v) if un > 0.0 => v.norm() / un,
            _ => 1.0,
        };
        if let Some(model) = self.model_at(u) {
            node.load = model.power(u);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;

    fn composite() -> CompositeLoad {
        let s0 = cmplx!(10.0, 5.0);
        CompositeLoad::new()
            .range(
                0.9,
                1.1,
                Zip {
                    s0,
                    pw: [1.0, 0.0, 0.0],
                    qw: [1.0, 0.0, 0.0],
                },
            )
            .range(
                0.0,
                0.9,
                Zip {
                    s0,
                    pw: [0.0, 0.0, 1.0],
                    qw: [0.0, 0.0, 1.0],
                },
            )
    }

    #[test]
    fn constant_power_inside_normal_band() {
        let mut n = Node::pq(1, cmplx!(10.0), cmplx!()).with_voltage(cmplx!(9.8));
        composite().apply(&mut n);
        assert_eq!(n.load, cmplx!(10.0, 5.0));
    }

    #[test]
    fn constant_impedance_at_low_voltage() {
        let mut n = Node::pq(1, cmplx!(10.0), cmplx!()).with_voltage(cmplx!(5.0));
        composite().apply(&mut n);
        assert!((n.load - cmplx!(2.5, 1.25)).norm() < 1e-12);
    }

    #[test]
    fn last_range_covers_overvoltage() {
        let mut n = Node::pq(1, cmplx!(10.0), cmplx!()).with_voltage(cmplx!(12.0));
        composite().apply(&mut n);
        assert_eq!(n.load, cmplx!(10.0, 5.0));
    }

    #[test]
    fn closures_are_load_models() {
        let halve = |n: &mut Node| n.load = n.load / 2.0;
        let mut n = Node::pq(1, cmplx!(1.0), cmplx!(4.0, 2.0));
        halve.apply(&mut n);
        assert_eq!(n.load, cmplx!(2.0, 1.0));
    }
}
