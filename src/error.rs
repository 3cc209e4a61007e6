//! # Error Types
//!
//! This module defines the error type shared by every subsystem of the crate.
//! Contract violations (wrong input width, mismatched weight shapes, unknown
//! tags) surface as `Err` values. Numeric instability inside the simulation is
//! recovered locally and never reaches this type.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use neurorace::error::{RaceError, Result};
//!
//! fn check_width(width: f64) -> Result<()> {
//!     if width <= 0.0 {
//!         return Err(RaceError::Configuration("track width must be positive".into()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_width(80.0).is_ok());
//! assert!(check_width(0.0).is_err());
//! ```
//!
//! Using the `OptionExt` trait to convert `Option` to `Result`:
//!
//! ```rust
//! use neurorace::error::{RaceError, OptionExt};
//!
//! fn best(fitness: &[f64]) -> neurorace::error::Result<f64> {
//!     fitness
//!         .iter()
//!         .cloned()
//!         .fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |a| a.max(f))))
//!         .ok_or_else_race(|| RaceError::EmptyPopulation)
//! }
//!
//! assert_eq!(best(&[1.0, 3.0, 2.0]).unwrap(), 3.0);
//! ```

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Represents errors that can occur while building tracks, running networks
/// or evolving populations.
#[derive(Error, Debug)]
pub enum RaceError {
    /// The network received an input vector of the wrong width.
    #[error("Input size error: expected {expected} inputs, got {actual}")]
    InputSize { expected: usize, actual: usize },

    /// Two weight structures (or a weight structure and an architecture) disagree in shape.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An activation tag that is not part of the closed activation set.
    #[error("Unknown activation type: {0}")]
    UnknownActivation(String),

    /// A brain-selection strategy tag that is not recognized.
    #[error("Unknown brain strategy: {0}")]
    UnknownStrategy(String),

    /// Error that occurs when an invalid configuration is provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error that occurs when an empty population is encountered.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// Error that occurs when NaN or infinity values are encountered.
    #[error("Invalid numeric value: {0}")]
    InvalidNumericValue(String),

    /// A persisted snapshot could not be decoded.
    #[error("Import error: {0}")]
    Import(String),

    /// Error raised by the JSON layer.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, RaceError>;

/// Extension trait for Result to add context to errors.
///
/// ## Examples
///
/// ```rust
/// use neurorace::error::ResultExt;
///
/// fn parse(raw: &str) -> neurorace::error::Result<u32> {
///     raw.parse::<u32>().context("Failed to parse generation")
/// }
///
/// assert!(parse("12").is_ok());
/// assert!(parse("x").is_err());
/// ```
pub trait ResultExt<T, E> {
    /// Converts the error to a `RaceError` carrying the provided context.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| RaceError::Other(format!("{}: {}", context, e)))
    }
}

/// Extension trait for Option to convert to Result with a custom error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, RaceError>` using a closure to
    /// generate the error.
    fn ok_or_else_race<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> RaceError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_else_race<F>(self, err_fn: F) -> Result<T>
    where
        F: FnOnce() -> RaceError,
    {
        self.ok_or_else(err_fn)
    }
}
