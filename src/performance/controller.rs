//! PID-style population sizing.
//!
//! The controller turns the gap between measured and target FPS into a
//! population delta, limits it to a fraction of the current population per
//! adjustment and keeps the total inside the configured bounds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::monitor::PerformanceMetrics;
use crate::error::{RaceError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerOptions {
    pub target_fps: f64,
    /// Bounds of the total population across all species.
    pub min_population: usize,
    pub max_population: usize,
    pub initial_population: usize,
    /// Largest change per adjustment, as a fraction of the current population.
    pub max_change_rate: f64,
    /// Calls to `calculate_optimal_population` between two adjustments.
    pub adjustment_interval: u32,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// FPS error treated as "on target".
    pub dead_band: f64,
    /// Bound on the accumulated FPS error.
    pub integral_limit: f64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            min_population: 10,
            max_population: 500,
            initial_population: 100,
            max_change_rate: 0.1,
            adjustment_interval: 60,
            kp: 0.5,
            ki: 0.05,
            kd: 0.1,
            dead_band: 2.0,
            integral_limit: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentReason {
    /// Not yet due.
    Waiting,
    /// The monitor has too few samples.
    NotCalibrated,
    WithinDeadBand,
    Increase,
    Decrease,
    /// A change was wanted but the population sits at a bound.
    AtLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationDecision {
    pub population_per_type: usize,
    pub total_population: usize,
    pub delta: i64,
    pub reason: AdjustmentReason,
    pub metrics: PerformanceMetrics,
    pub num_types: usize,
}

#[derive(Debug, Clone)]
pub struct PopulationController {
    options: ControllerOptions,
    num_types: usize,
    population: usize,
    integral: f64,
    previous_error: Option<f64>,
    calls: u32,
}

impl PopulationController {
    /// # Errors
    ///
    /// Fails when the population bounds are inverted or the target FPS is
    /// not positive.
    pub fn new(options: ControllerOptions, num_types: usize) -> Result<Self> {
        if options.min_population > options.max_population {
            return Err(RaceError::Configuration(format!(
                "min_population {} exceeds max_population {}",
                options.min_population, options.max_population
            )));
        }
        if !(options.target_fps > 0.0) {
            return Err(RaceError::Configuration(format!(
                "target_fps must be positive, got {}",
                options.target_fps
            )));
        }
        let population = options
            .initial_population
            .clamp(options.min_population, options.max_population);
        Ok(Self {
            options,
            num_types: num_types.max(1),
            population,
            integral: 0.0,
            previous_error: None,
            calls: 0,
        })
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    pub fn population(&self) -> usize {
        self.population
    }

    pub fn num_types(&self) -> usize {
        self.num_types
    }

    pub fn population_per_type(&self) -> usize {
        (self.population / self.num_types).max(1)
    }

    /// Runs one control step every `adjustment_interval` calls.
    pub fn calculate_optimal_population(&mut self, metrics: &PerformanceMetrics) -> PopulationDecision {
        self.calls += 1;
        if self.calls < self.options.adjustment_interval.max(1) {
            return self.decision(0, AdjustmentReason::Waiting, metrics);
        }
        self.calls = 0;

        if !metrics.calibrated {
            return self.decision(0, AdjustmentReason::NotCalibrated, metrics);
        }

        // The 1% low tail reacts to stutter that the mean hides.
        let measured = if metrics.low_1_fps > 0.0 {
            metrics.low_1_fps
        } else {
            metrics.average_fps
        };
        let error = measured - self.options.target_fps;
        let derivative = self.previous_error.map_or(0.0, |previous| error - previous);
        self.previous_error = Some(error);

        if error.abs() <= self.options.dead_band {
            return self.decision(0, AdjustmentReason::WithinDeadBand, metrics);
        }

        let limit = self.options.integral_limit.abs();
        self.integral = (self.integral + error).clamp(-limit, limit);
        let output =
            self.options.kp * error + self.options.ki * self.integral + self.options.kd * derivative;

        let current = self.population as f64;
        let max_step = (current * self.options.max_change_rate.abs()).max(1.0);
        let step = (current * output / self.options.target_fps)
            .clamp(-max_step, max_step)
            .round();
        let wanted = (current + step).max(0.0) as usize;
        let next = wanted.clamp(self.options.min_population, self.options.max_population);
        let delta = next as i64 - self.population as i64;

        let reason = match delta {
            0 => AdjustmentReason::AtLimit,
            d if d > 0 => AdjustmentReason::Increase,
            _ => AdjustmentReason::Decrease,
        };
        debug!(
            measured_fps = measured,
            error,
            integral = self.integral,
            from = self.population,
            to = next,
            "population adjustment"
        );
        self.population = next;
        self.decision(delta, reason, metrics)
    }

    /// Rebases the controller on a new total population.
    pub fn set_population(&mut self, population: usize) {
        self.population = population.clamp(self.options.min_population, self.options.max_population);
        self.integral = 0.0;
        self.previous_error = None;
    }

    pub fn set_num_types(&mut self, num_types: usize) {
        self.num_types = num_types.max(1);
    }

    pub fn reset(&mut self) {
        self.population = self
            .options
            .initial_population
            .clamp(self.options.min_population, self.options.max_population);
        self.integral = 0.0;
        self.previous_error = None;
        self.calls = 0;
    }

    fn decision(&self, delta: i64, reason: AdjustmentReason, metrics: &PerformanceMetrics) -> PopulationDecision {
        PopulationDecision {
            population_per_type: self.population_per_type(),
            total_population: self.population,
            delta,
            reason,
            metrics: metrics.clone(),
            num_types: self.num_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(fps: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            sample_count: 60,
            calibrated: true,
            average_fps: fps,
            low_1_fps: fps,
            ..PerformanceMetrics::default()
        }
    }

    fn controller(interval: u32) -> PopulationController {
        PopulationController::new(
            ControllerOptions {
                adjustment_interval: interval,
                ..ControllerOptions::default()
            },
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_runs_only_every_interval() {
        let mut c = controller(3);
        assert_eq!(c.calculate_optimal_population(&metrics(20.0)).reason, AdjustmentReason::Waiting);
        assert_eq!(c.calculate_optimal_population(&metrics(20.0)).reason, AdjustmentReason::Waiting);
        let decision = c.calculate_optimal_population(&metrics(20.0));
        assert_eq!(decision.reason, AdjustmentReason::Decrease);
        assert_eq!(decision.delta, -10);
        assert_eq!(decision.total_population, 90);
        assert_eq!(decision.population_per_type, 45);
    }

    #[test]
    fn test_increase_is_rate_limited() {
        let mut c = controller(1);
        let decision = c.calculate_optimal_population(&metrics(240.0));
        assert_eq!(decision.reason, AdjustmentReason::Increase);
        assert_eq!(decision.delta, 10);
    }

    #[test]
    fn test_dead_band_and_calibration() {
        let mut c = controller(1);
        assert_eq!(
            c.calculate_optimal_population(&metrics(61.0)).reason,
            AdjustmentReason::WithinDeadBand
        );
        let uncalibrated = PerformanceMetrics::default();
        assert_eq!(
            c.calculate_optimal_population(&uncalibrated).reason,
            AdjustmentReason::NotCalibrated
        );
        assert_eq!(c.population(), 100);
    }

    #[test]
    fn test_bounds_hold() {
        let mut c = PopulationController::new(
            ControllerOptions {
                adjustment_interval: 1,
                min_population: 95,
                ..ControllerOptions::default()
            },
            1,
        )
        .unwrap();
        c.calculate_optimal_population(&metrics(10.0));
        assert_eq!(c.population(), 95);
        let decision = c.calculate_optimal_population(&metrics(10.0));
        assert_eq!(decision.reason, AdjustmentReason::AtLimit);
        assert_eq!(decision.delta, 0);
    }

    #[test]
    fn test_reset_and_rebase() {
        let mut c = controller(1);
        c.calculate_optimal_population(&metrics(20.0));
        c.set_population(1000);
        assert_eq!(c.population(), 500);
        c.set_num_types(0);
        assert_eq!(c.num_types(), 1);
        c.reset();
        assert_eq!(c.population(), 100);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let options = ControllerOptions {
            min_population: 50,
            max_population: 10,
            ..ControllerOptions::default()
        };
        assert!(PopulationController::new(options, 1).is_err());
    }
}
