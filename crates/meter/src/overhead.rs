//! Overhead calibration
//!
//! Every measurement pays for its own bookkeeping: composing the path,
//! touching the store and reading the clocks. The calibrator estimates that
//! fixed cost by timing batches of empty measurements so meters can subtract
//! it from what they record.
//!
//! The estimate is computed once per process and shared read-only by every
//! meter that opts into subtraction. [`reset_overhead`] drops the cached
//! value so tests can force a fresh calibration.

use crate::meter::{Meter, MeterConfig};
use crate::timing::{ClockReading, TimeSample};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Process-wide calibration result
static OVERHEAD: OnceLock<Mutex<Option<Calibration>>> = OnceLock::new();

fn overhead_slot() -> MutexGuard<'static, Option<Calibration>> {
    let slot = OVERHEAD.get_or_init(|| Mutex::new(None));
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Sampling protocol for the calibrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationConfig {
    /// Empty measurements in the first round; doubled every round
    pub seed_batch: u64,
    /// Wall-clock budget in milliseconds that ends sampling once exceeded
    pub min_duration_ms: u64,
    /// Upper bound on the number of rounds
    pub max_rounds: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            seed_batch: 1_000,
            min_duration_ms: 100,
            max_rounds: 12,
        }
    }
}

impl CalibrationConfig {
    /// Builder method to set the first batch size.
    pub fn with_seed_batch(mut self, seed_batch: u64) -> Self {
        self.seed_batch = seed_batch;
        self
    }

    /// Builder method to set the sampling budget.
    pub fn with_min_duration_ms(mut self, ms: u64) -> Self {
        self.min_duration_ms = ms;
        self
    }

    /// Builder method to set the round limit.
    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }
}

/// Outcome of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
    /// Mean bookkeeping cost of one measurement
    pub per_call: TimeSample,
    /// Empty measurements taken
    pub invocations: u64,
    /// Rounds executed
    pub rounds: u32,
    /// False when the round limit was hit before the time budget
    pub complete: bool,
}

impl Calibration {
    /// A calibration that reports no overhead.
    pub fn zero() -> Self {
        Self {
            per_call: TimeSample::ZERO,
            invocations: 0,
            rounds: 0,
            complete: true,
        }
    }
}

/// Run the calibration protocol now, without touching the cached value.
///
/// Batches of empty measurements run on a scratch meter, starting from
/// `seed_batch` and doubling, until the accumulated wall-clock time reaches
/// `min_duration_ms` or `max_rounds` rounds have run. When the round limit
/// wins the best estimate so far is returned with `complete == false`.
pub fn calibrate(config: &CalibrationConfig) -> Calibration {
    let scratch = Meter::with_config(MeterConfig::default().with_subtract_overhead(false));
    let budget_secs = config.min_duration_ms as f64 / 1000.0;
    let max_rounds = config.max_rounds.max(1);

    let mut batch = config.seed_batch.max(1);
    let mut total = TimeSample::ZERO;
    let mut invocations = 0u64;
    let mut rounds = 0u32;
    let mut complete = false;

    while rounds < max_rounds {
        let start = ClockReading::now();
        for _ in 0..batch {
            let _ = scratch.measure("overhead", || ());
        }
        total += start.elapsed();
        invocations += batch;
        rounds += 1;
        scratch.clear();

        if total.real >= budget_secs {
            complete = true;
            break;
        }
        batch = batch.saturating_mul(2);
    }

    let per_call = total / invocations as f64;
    if complete {
        tracing::debug!(
            target: "meter::calibrate",
            invocations,
            rounds,
            per_call_real = per_call.real,
            "overhead calibrated"
        );
    } else {
        tracing::warn!(
            target: "meter::calibrate",
            invocations,
            rounds,
            sampled_secs = total.real,
            budget_secs,
            "calibration hit the round limit before its time budget, using best estimate"
        );
    }

    Calibration {
        per_call,
        invocations,
        rounds,
        complete,
    }
}

/// The process-wide calibration, computed with the default protocol on
/// first use.
pub fn calibrated_overhead() -> Calibration {
    calibrated_overhead_with(&CalibrationConfig::default())
}

/// The process-wide calibration, computed with `config` if nothing is
/// cached yet. Later calls return the cached value whatever their config.
pub fn calibrated_overhead_with(config: &CalibrationConfig) -> Calibration {
    let mut slot = overhead_slot();
    if let Some(calibration) = *slot {
        return calibration;
    }
    let calibration = calibrate(config);
    *slot = Some(calibration);
    calibration
}

/// The cached calibration, if one has been computed.
pub fn cached_overhead() -> Option<Calibration> {
    *overhead_slot()
}

/// Forget the cached calibration so the next request recomputes it.
pub fn reset_overhead() {
    *overhead_slot() = None;
}
