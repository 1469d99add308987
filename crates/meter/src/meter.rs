//! Scoped timing accumulator
//!
//! A [`Meter`] records how often and for how long nested scopes run. Each
//! call to [`Meter::measure`] pushes a label on the active path, times the
//! body and folds the result into the store under the full path, e.g.
//! `\blocks\load\parse`.
//!
//! # Example
//!
//! ```rust
//! use meter::Meter;
//!
//! let meter = Meter::new();
//! let total = meter.measure("load", || {
//!     meter.measure("parse", || 40 + 2).unwrap()
//! }).unwrap();
//! assert_eq!(total, 42);
//!
//! let paths: Vec<String> = meter.measurements().iter().map(|m| m.path.to_string()).collect();
//! assert_eq!(paths, ["\\blocks", "\\blocks\\load", "\\blocks\\load\\parse"]);
//! ```

use crate::error::MeterResult;
use crate::overhead::{calibrated_overhead, calibrated_overhead_with, CalibrationConfig};
use crate::path::{validate_label, Forest, MeasurementPath, PATH_DELIMITER};
use crate::report::{accuracy, ReportComputer, ReportFormat, ReportOptions, ReportRow};
use crate::store::{Measurement, MeasurementStore};
use crate::timing::{ClockReading, TimeSample};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::Display;

/// Meter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeterConfig {
    /// When false, bodies run with no bookkeeping at all
    pub enabled: bool,
    /// Subtract the calibrated per-call overhead from every timed entry
    pub subtract_overhead: bool,
    /// Protocol used if this meter triggers the process-wide calibration
    pub calibration: CalibrationConfig,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            subtract_overhead: false,
            calibration: CalibrationConfig::default(),
        }
    }
}

impl MeterConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> MeterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builder method to enable or disable measuring.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to toggle overhead subtraction.
    pub fn with_subtract_overhead(mut self, subtract: bool) -> Self {
        self.subtract_overhead = subtract;
        self
    }

    /// Builder method to set the calibration protocol.
    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }
}

#[derive(Debug, Default)]
struct MeterState {
    store: MeasurementStore,
    /// Segments of the innermost active path; empty when nothing is measuring
    active: Vec<String>,
}

/// How to put the active path back when a frame exits.
enum Restore {
    Truncate(usize),
    Replace(Vec<String>),
}

/// Undoes a frame's bookkeeping exactly once, also while unwinding.
struct FrameGuard<'a> {
    meter: &'a Meter,
    path: MeasurementPath,
    restore: Restore,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        // No borrow of the state spans a body or outlives `record`
        let mut state = self.meter.state.borrow_mut();
        match &mut self.restore {
            Restore::Truncate(len) => state.active.truncate(*len),
            Restore::Replace(previous) => state.active = std::mem::take(previous),
        }
        if let Some(m) = state.store.get_mut(&self.path) {
            m.depth = m.depth.saturating_sub(1);
        }
    }
}

/// Records nested measurements for one call tree.
///
/// The meter is single-threaded: its state lives in a `RefCell`, so it is
/// `!Sync` and sharing one across threads needs an external lock.
#[derive(Debug)]
pub struct Meter {
    state: RefCell<MeterState>,
    enabled: bool,
    subtract_overhead: bool,
    overhead: TimeSample,
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter {
    /// Create a meter with default settings (no overhead subtraction).
    pub fn new() -> Self {
        Self::with_config(MeterConfig::default())
    }

    /// Create a meter that runs bodies without recording anything.
    pub fn disabled() -> Self {
        Self::with_config(MeterConfig::default().with_enabled(false))
    }

    /// Create a meter from a configuration.
    ///
    /// With `subtract_overhead` set this triggers the process-wide
    /// calibration if it has not run yet.
    pub fn with_config(config: MeterConfig) -> Self {
        let overhead = if config.enabled && config.subtract_overhead {
            calibrated_overhead_with(&config.calibration).per_call
        } else {
            TimeSample::ZERO
        };
        Self {
            state: RefCell::new(MeterState::default()),
            enabled: config.enabled,
            subtract_overhead: config.enabled && config.subtract_overhead,
            overhead,
        }
    }

    /// A subtracting meter with a fixed overhead sample.
    #[cfg(test)]
    pub(crate) fn with_overhead(overhead: TimeSample) -> Self {
        Self {
            state: RefCell::new(MeterState::default()),
            enabled: true,
            subtract_overhead: true,
            overhead,
        }
    }

    /// Measure `body` under `label`, nested in whatever is being measured.
    ///
    /// Returns the body's value unchanged. A body that returns a `Result`
    /// has its error handed back inside `T`. Fails only when `label` is
    /// empty or contains the path delimiter, in which case nothing is
    /// recorded and the body does not run.
    pub fn measure<T, F>(&self, label: &str, body: F) -> MeterResult<T>
    where
        F: FnOnce() -> T,
    {
        validate_label(label)?;
        Ok(self.measure_in(Forest::Blocks, label, body))
    }

    /// Measure an expression and file it by its outcome.
    ///
    /// The entry ends up under `label = "<result>"` next to where `label`
    /// would have been recorded, so a boolean check produces one row per
    /// outcome. Use it only for expressions with a handful of distinct
    /// results.
    pub fn measure_result<T, F>(&self, label: &str, body: F) -> MeterResult<T>
    where
        T: Display,
        F: FnOnce() -> T,
    {
        validate_label(label)?;
        let result = self.measure_in(Forest::Blocks, label, body);
        if !self.enabled {
            return Ok(result);
        }

        let outcome = result.to_string().replace(PATH_DELIMITER, "/");
        let mut state = self.state.borrow_mut();
        let base = if state.active.is_empty() {
            MeasurementPath::root(Forest::Blocks)
        } else {
            MeasurementPath::from_trusted(state.active.clone())
        };
        let transient = base.child(label);
        let canonical = transient.with_last(&format!("{} = \"{}\"", label, outcome));
        state.store.merge_into(&transient, &canonical);
        Ok(result)
    }

    /// Measure `body` at an explicit absolute path.
    ///
    /// The active path is replaced by `path` for the duration of the body,
    /// so nested measurements land beneath it, and restored afterwards.
    /// Measuring a path that an enclosing frame is already measuring counts
    /// the entry without timing it again.
    pub fn measure_path<T, F>(&self, path: &MeasurementPath, body: F) -> T
    where
        F: FnOnce() -> T,
    {
        if !self.enabled {
            return body();
        }
        let previous = {
            let mut state = self.state.borrow_mut();
            std::mem::replace(&mut state.active, path.segments().to_vec())
        };
        self.run_frame(path.clone(), Restore::Replace(previous), body)
    }

    /// Measure under `label` with a pre-validated label. Outermost calls
    /// start in `forest`; nested calls continue the active path.
    pub(crate) fn measure_in<T, F>(&self, forest: Forest, label: &str, body: F) -> T
    where
        F: FnOnce() -> T,
    {
        if !self.enabled {
            return body();
        }
        let (path, restore) = {
            let mut state = self.state.borrow_mut();
            let restore = Restore::Truncate(state.active.len());
            if state.active.is_empty() {
                state.active.push(forest.root_segment().to_string());
            }
            state.active.push(label.to_string());
            (MeasurementPath::from_trusted(state.active.clone()), restore)
        };
        self.run_frame(path, restore, body)
    }

    fn run_frame<T, F>(&self, path: MeasurementPath, restore: Restore, body: F) -> T
    where
        F: FnOnce() -> T,
    {
        let reentrant = {
            let mut state = self.state.borrow_mut();
            let m = state.store.get_or_create(&path);
            m.count += 1;
            m.depth += 1;
            m.depth > 1
        };
        let guard = FrameGuard {
            meter: self,
            path,
            restore,
        };

        if reentrant {
            return body();
        }

        let start = ClockReading::now();
        let result = body();
        let raw = start.elapsed();
        self.record(&guard.path, raw);
        result
    }

    /// `raw` net of the overhead sample, or `raw` itself when subtracting
    /// would make the CPU total or the real part negative.
    fn net_of_overhead(&self, raw: TimeSample) -> TimeSample {
        if !self.subtract_overhead {
            return raw;
        }
        let adjusted = raw - self.overhead;
        if adjusted.is_non_negative() {
            adjusted
        } else {
            raw
        }
    }

    /// Add a timed entry to `path` and to the ancestors no enclosing frame
    /// is timing.
    ///
    /// Walking up stops at the first ancestor being measured, since its own
    /// frame already covers this time. For nested labels that is the parent;
    /// for an outermost call or an absolute path it is the forest root or
    /// beyond.
    fn record(&self, path: &MeasurementPath, raw: TimeSample) {
        let time = self.net_of_overhead(raw);

        let mut state = self.state.borrow_mut();
        if let Some(m) = state.store.get_mut(path) {
            m.time += time;
        }
        let mut ancestor = path.parent();
        while let Some(current) = ancestor {
            match state.store.get_mut(&current) {
                Some(m) if m.depth == 0 => m.time += time,
                _ => break,
            }
            ancestor = current.parent();
        }

        tracing::trace!(
            target: "meter::record",
            path = %path,
            real = time.real,
            "measurement recorded"
        );
    }

    /// Drop all measurements. Settings and the overhead sample are kept.
    pub fn clear(&self) {
        self.state.borrow_mut().store.clear();
        tracing::debug!(target: "meter::record", "measurements cleared");
    }

    /// Whether this meter records anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the calibrated overhead is subtracted while recording.
    pub fn subtracts_overhead(&self) -> bool {
        self.subtract_overhead
    }

    /// Per-call overhead subtracted by this meter; zero when disabled.
    pub fn overhead(&self) -> TimeSample {
        self.overhead
    }

    /// All measurements, ordered by path.
    pub fn measurements(&self) -> Vec<Measurement> {
        self.state.borrow().store.iter().cloned().collect()
    }

    /// A copy of the measurement at `path`.
    pub fn get(&self, path: &MeasurementPath) -> Option<Measurement> {
        self.state.borrow().store.get(path).cloned()
    }

    /// Number of recorded paths.
    pub fn len(&self) -> usize {
        self.state.borrow().store.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().store.is_empty()
    }

    /// The innermost path being measured right now.
    pub fn current_path(&self) -> Option<MeasurementPath> {
        let state = self.state.borrow();
        if state.active.is_empty() {
            None
        } else {
            Some(MeasurementPath::from_trusted(state.active.clone()))
        }
    }

    /// Aggregate time of a forest.
    pub fn forest_time(&self, forest: Forest) -> TimeSample {
        self.state.borrow().store.forest_time(forest)
    }

    /// Bookkeeping noise floor used to judge accuracy.
    ///
    /// Uses this meter's overhead when it subtracts one, otherwise the
    /// process-wide calibration (computing it on first use).
    pub fn noise_floor(&self) -> TimeSample {
        if self.subtract_overhead {
            self.overhead
        } else {
            calibrated_overhead().per_call
        }
    }

    /// Confidence score of the measurement at `path`, see [`accuracy`].
    pub fn accuracy(&self, path: &MeasurementPath) -> Option<f64> {
        let measurement = self.get(path)?;
        Some(accuracy(&measurement, &self.noise_floor()))
    }

    /// Compute report rows from a snapshot of the store.
    ///
    /// With `options.subtract_overhead` the calibrated overhead is taken out
    /// of each row, unless this meter already subtracted it while recording.
    pub fn compute_rows(&self, options: &ReportOptions) -> Vec<ReportRow> {
        let measurements = self.measurements();
        if measurements.is_empty() {
            return Vec::new();
        }
        let noise_floor = self.noise_floor();
        let overhead = if options.subtract_overhead && !self.subtract_overhead {
            noise_floor
        } else {
            TimeSample::ZERO
        };
        ReportComputer::new(overhead, noise_floor).compute(&measurements, options)
    }

    /// Compute rows and hand them to `format`.
    pub fn report<R: ReportFormat + ?Sized>(&self, format: &R, options: &ReportOptions) -> Vec<String> {
        format.render(&self.compute_rows(options), options)
    }
}
