use crate::math::EPSILON;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Admittance given to every breaker: the inverse of a small fixed impedance.
pub fn breaker_admittance() -> Complex64 {
    Complex64::new(1.0, 0.0) / Complex64::new(1e-4, 1e-3)
}

/// Tap magnitudes this close to one are plain lines.
const UNIT_TAP_TOLERANCE: f64 = 1e-9;

fn unit_tap() -> Complex64 {
    Complex64::new(1.0, 0.0)
}

/// Line, transformer or breaker between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub from_id: usize,
    pub to_id: usize,

    /// Calculation index of the "from" node. Assigned by the model.
    #[serde(default)]
    pub from_index: usize,
    /// Calculation index of the "to" node. Assigned by the model.
    #[serde(default)]
    pub to_index: usize,

    pub series_admittance: Complex64,

    /// Total shunt (charging) admittance.
    #[serde(default)]
    pub shunt_admittance: Complex64,

    /// Complex turns ratio. Magnitude one is a plain line, zero a breaker.
    /// For transformers it is the ratio of the low-voltage side to the
    /// high-voltage side.
    #[serde(default = "unit_tap")]
    pub tap_ratio: Complex64,

    /// Number of branches sharing this branch's endpoint pair, itself
    /// included. Assigned by the model.
    #[serde(default)]
    pub parallel_count: usize,

    #[serde(default)]
    pub current_from: Complex64,
    #[serde(default)]
    pub current_to: Complex64,
    #[serde(default)]
    pub power_from: Complex64,
    #[serde(default)]
    pub power_to: Complex64,
}

/// Two-port admittances of a branch: the currents injected into the branch
/// at each end are
///
/// ```text
///      | If |   | ff  ft |   | Uf |
///      |    | = |        | * |    |
///      | It |   | tf  tt |   | Ut |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoPort {
    pub ff: Complex64,
    pub ft: Complex64,
    pub tf: Complex64,
    pub tt: Complex64,
}

impl Branch {
    pub fn line(from_id: usize, to_id: usize, series_admittance: Complex64) -> Self {
        Self {
            from_id,
            to_id,
            from_index: 0,
            to_index: 0,
            series_admittance,
            shunt_admittance: Complex64::default(),
            tap_ratio: unit_tap(),
            parallel_count: 0,
            current_from: Complex64::default(),
            current_to: Complex64::default(),
            power_from: Complex64::default(),
            power_to: Complex64::default(),
        }
    }

    pub fn transformer(
        from_id: usize,
        to_id: usize,
        series_admittance: Complex64,
        tap_ratio: Complex64,
    ) -> Self {
        Self {
            tap_ratio,
            ..Self::line(from_id, to_id, series_admittance)
        }
    }

    pub fn breaker(from_id: usize, to_id: usize) -> Self {
        Self {
            tap_ratio: Complex64::default(),
            ..Self::line(from_id, to_id, Complex64::default())
        }
    }

    pub fn with_shunt(mut self, y: Complex64) -> Self {
        self.shunt_admittance = y;
        self
    }

    pub fn is_breaker(&self) -> bool {
        self.tap_ratio.norm() <= EPSILON
    }

    pub fn is_transformer(&self) -> bool {
        !self.is_breaker() && (self.tap_ratio.norm() - 1.0).abs() > UNIT_TAP_TOLERANCE
    }

    /// Endpoint indices as an unordered pair.
    pub(crate) fn endpoints(&self) -> (usize, usize) {
        if self.from_index <= self.to_index {
            (self.from_index, self.to_index)
        } else {
            (self.to_index, self.from_index)
        }
    }

    /// Two-port admittances given the nominal voltage magnitudes of the
    /// "from" and "to" nodes.
    ///
    /// Breakers use the breaker template split over the parallel group.
    /// Transformers put the whole shunt on the high-voltage side and scale
    /// the low-voltage self-admittance by `1 / (tap * conj(tap))`.
    pub fn two_port(&self, un_from: f64, un_to: f64) -> TwoPort {
        if self.is_breaker() {
            let y = breaker_admittance() / self.parallel_count.max(1) as f64;
            return TwoPort {
                ff: y,
                ft: -y,
                tf: -y,
                tt: y,
            };
        }

        let y = self.series_admittance;
        let tap = self.tap_ratio;

        if !self.is_transformer() {
            let y_half = y + self.shunt_admittance / 2.0;
            return TwoPort {
                ff: y_half,
                ft: -y / tap,
                tf: -y / tap.conj(),
                tt: y_half,
            };
        }

        let hh = y + self.shunt_admittance;
        let ll = y / (tap * tap.conj());
        let hl = -y / tap;
        let lh = -y / tap.conj();
        if un_from >= un_to {
            TwoPort {
                ff: hh,
                ft: hl,
                tf: lh,
                tt: ll,
            }
        } else {
            TwoPort {
                ff: ll,
                ft: lh,
                tf: hl,
                tt: hh,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;

    #[test]
    fn classification() {
        assert!(Branch::breaker(1, 2).is_breaker());
        assert!(!Branch::line(1, 2, cmplx!(1.0, -2.0)).is_transformer());
        assert!(Branch::transformer(1, 2, cmplx!(1.0, -2.0), cmplx!(0.95)).is_transformer());
        assert!(!Branch::transformer(1, 2, cmplx!(1.0), Complex64::from_polar(1.0, 0.1))
            .is_transformer());
    }

    #[test]
    fn transformer_orientation_follows_nominal_voltage() {
        let y = cmplx!(2.0, -8.0);
        let tr = Branch::transformer(1, 2, y, cmplx!(0.5)).with_shunt(cmplx!(0.0, 0.25));

        let hv_from = tr.two_port(110.0, 10.0);
        assert_eq!(hv_from.ff, y + cmplx!(0.0, 0.25));
        assert_eq!(hv_from.tt, y * 4.0);
        assert_eq!(hv_from.ft, -y * 2.0);

        let hv_to = tr.two_port(10.0, 110.0);
        assert_eq!(hv_to.tt, y + cmplx!(0.0, 0.25));
        assert_eq!(hv_to.ff, y * 4.0);
    }

    #[test]
    fn parallel_breakers_share_the_template() {
        let mut br = Branch::breaker(1, 2);
        br.parallel_count = 2;
        let tp = br.two_port(1.0, 1.0);
        assert_eq!(tp.ff, breaker_admittance() / 2.0);
        assert_eq!(tp.ft, -tp.ff);
    }
}
