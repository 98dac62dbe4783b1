use crate::error::PowerFlowError;
use clap::ValueEnum;
use derive_builder::Builder;

#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
pub enum Alg {
    /// Newton's method (power balance, polar coordinates).
    NR,
    /// Gauss-Seidel method.
    GS,
}

/// Numeric settings shared by both solvers.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct CalculationOptions {
    /// Termination tolerance: largest power mismatch for Newton's method,
    /// largest voltage step for Gauss-Seidel.
    pub accuracy: f64,

    /// Maximum number of iterations.
    pub iterations_count: usize,

    /// Width of the Gauss-Seidel voltage plausibility band, as a ratio of the
    /// voltage magnitude.
    pub voltage_ratio: f64,

    /// Alternate Newton stop criterion on the voltage step. Accepted and
    /// validated but not consulted by either solver.
    pub voltage_convergence: f64,

    /// Gauss-Seidel relaxation factor. Values above one over-relax.
    pub acceleration_rate: f64,

    /// Check final voltage magnitudes against a band around nominal.
    pub use_voltage_constraint: bool,

    /// Half-width of that band in percent of the nominal magnitude.
    pub voltage_constraint_percentage: f64,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            accuracy: 1e-6,
            iterations_count: 100,
            voltage_ratio: 0.5,
            voltage_convergence: 1e-6,
            acceleration_rate: 0.9,
            use_voltage_constraint: false,
            voltage_constraint_percentage: 10.0,
        }
    }
}

impl CalculationOptions {
    pub fn builder() -> CalculationOptionsBuilder {
        CalculationOptionsBuilder::default()
    }

    /// Applies the builder's validation to options constructed directly.
    pub fn check(&self) -> anyhow::Result<()> {
        let builder = CalculationOptionsBuilder {
            accuracy: Some(self.accuracy),
            iterations_count: Some(self.iterations_count),
            voltage_ratio: Some(self.voltage_ratio),
            voltage_convergence: Some(self.voltage_convergence),
            acceleration_rate: Some(self.acceleration_rate),
            use_voltage_constraint: Some(self.use_voltage_constraint),
            voltage_constraint_percentage: Some(self.voltage_constraint_percentage),
        };
        builder
            .validate()
            .map_err(|msg| PowerFlowError::InvalidOptions(msg).into())
    }
}

impl CalculationOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(accuracy) = self.accuracy {
            if !(accuracy > 0.0) {
                return Err(format!("accuracy ({}) must be positive", accuracy));
            }
        }
        if let Some(iterations_count) = self.iterations_count {
            if iterations_count == 0 {
                return Err("iterations_count must be at least one".to_string());
            }
        }
        if let Some(rate) = self.acceleration_rate {
            if !(rate > 0.0) {
                return Err(format!("acceleration_rate ({}) must be positive", rate));
            }
        }
        if let Some(ratio) = self.voltage_ratio {
            if !(ratio >= 0.0) {
                return Err(format!("voltage_ratio ({}) must not be negative", ratio));
            }
        }
        if let Some(pct) = self.voltage_constraint_percentage {
            if !(pct >= 0.0) {
                return Err(format!(
                    "voltage_constraint_percentage ({}) must not be negative",
                    pct
                ));
            }
        }
        Ok(())
    }
}
