//! # Performance
//!
//! Frame statistics and the closed loop that sizes the population from them.
//!
//! ```rust
//! use neurorace::performance::{ControllerOptions, MonitorOptions, PerformanceMonitor, PopulationController};
//!
//! let mut monitor = PerformanceMonitor::new(MonitorOptions::default());
//! let mut controller = PopulationController::new(
//!     ControllerOptions { adjustment_interval: 1, ..ControllerOptions::default() },
//!     2,
//! )?;
//!
//! for _ in 0..60 {
//!     monitor.record_frame_time(25.0); // 40 FPS against a 60 FPS target
//! }
//! let decision = controller.calculate_optimal_population(&monitor.get_metrics());
//! assert!(decision.delta < 0);
//! # Ok::<(), neurorace::error::RaceError>(())
//! ```

pub mod controller;
pub mod monitor;

pub use controller::{AdjustmentReason, ControllerOptions, PopulationController, PopulationDecision};
pub use monitor::{MonitorOptions, PerformanceMetrics, PerformanceMonitor};
