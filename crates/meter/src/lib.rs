//! Call-Tree Performance Meter
//!
//! This crate measures how often and for how long nested pieces of code run,
//! in process and without sampling:
//!
//! - Scoped timing of closures, nested into a tree of paths
//! - Outcome-split measurements for expressions with few distinct results
//! - Member instrumentation through swappable dispatch slots
//! - Overhead calibration, optionally subtracted from every entry
//! - Report rows with percent of parent and an accuracy score
//!
//! Measurements live in two forests: `\blocks` for ad hoc scopes and
//! `\methods` for instrumented members.
//!
//! # Feature Flags
//!
//! - `cpu-time` (default): Record user and system CPU time next to
//!   wall-clock time (unix only)
//!
//! # Example
//!
//! ```rust
//! use meter::{Meter, ReportOptions};
//!
//! let meter = Meter::new();
//! meter.measure("load", || {
//!     for i in 0..3 {
//!         meter.measure_result("even", || i % 2 == 0).unwrap();
//!     }
//! }).unwrap();
//!
//! let rows = meter.compute_rows(&ReportOptions::default());
//! let titles: Vec<&str> = rows.iter().map(|r| r.title.as_str()).collect();
//! assert_eq!(titles, ["blocks", "load", "even = \"false\"", "even = \"true\""]);
//! ```
//!
//! # Modules
//!
//! - [`meter`] - Scoped timing accumulator and its configuration
//! - [`instrument`] - Member instrumentation
//! - [`overhead`] - Overhead calibration
//! - [`report`] - Report rows and the formatter interface

mod error;
pub mod instrument;
pub mod meter;
pub mod overhead;
mod path;
mod registry;
pub mod report;
mod store;
mod timing;

pub use error::{MeterError, MeterResult};
pub use instrument::{DispatchSlot, Instrumenter, Member, MethodTable};
pub use meter::{Meter, MeterConfig};
pub use overhead::{
    calibrate, cached_overhead, calibrated_overhead, calibrated_overhead_with, reset_overhead,
    Calibration, CalibrationConfig,
};
pub use path::{validate_label, Forest, MeasurementPath, PATH_DELIMITER};
pub use registry::{MeterRegistry, DEFAULT_METER};
pub use report::{
    accuracy, format_accuracy, ReportComputer, ReportFormat, ReportLayout, ReportOptions,
    ReportRow, DEFAULT_MAX_COUNT_WIDTH, MIN_TOTAL_TIME,
};
pub use store::{Measurement, MeasurementStore};
pub use timing::{ClockReading, TimeSample, TIME_CAPTION};
