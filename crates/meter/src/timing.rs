//! Time triples and clock readings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub};
use std::time::Instant;

/// Column caption matching the [`fmt::Display`] layout of [`TimeSample`].
pub const TIME_CAPTION: &str = "      user     system      total        real";

/// Elapsed time split into user CPU, system CPU and wall-clock components.
///
/// All components are in seconds. Samples add up component-wise, which is how
/// repeated invocations of the same scope are aggregated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSample {
    /// User CPU time
    pub user: f64,
    /// System CPU time
    pub system: f64,
    /// Wall-clock time
    pub real: f64,
}

impl TimeSample {
    /// The zero triple.
    pub const ZERO: TimeSample = TimeSample {
        user: 0.0,
        system: 0.0,
        real: 0.0,
    };

    /// Create a sample from its three components.
    pub fn new(user: f64, system: f64, real: f64) -> Self {
        Self { user, system, real }
    }

    /// Combined CPU time (user + system).
    #[inline]
    pub fn total(&self) -> f64 {
        self.user + self.system
    }

    /// True when both the CPU total and the wall-clock part are non-negative.
    #[inline]
    pub fn is_non_negative(&self) -> bool {
        self.total() >= 0.0 && self.real >= 0.0
    }

    /// True when every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Add for TimeSample {
    type Output = TimeSample;

    fn add(self, rhs: TimeSample) -> TimeSample {
        TimeSample {
            user: self.user + rhs.user,
            system: self.system + rhs.system,
            real: self.real + rhs.real,
        }
    }
}

impl AddAssign for TimeSample {
    fn add_assign(&mut self, rhs: TimeSample) {
        *self = *self + rhs;
    }
}

impl Sub for TimeSample {
    type Output = TimeSample;

    fn sub(self, rhs: TimeSample) -> TimeSample {
        TimeSample {
            user: self.user - rhs.user,
            system: self.system - rhs.system,
            real: self.real - rhs.real,
        }
    }
}

impl Mul<f64> for TimeSample {
    type Output = TimeSample;

    fn mul(self, rhs: f64) -> TimeSample {
        TimeSample {
            user: self.user * rhs,
            system: self.system * rhs,
            real: self.real * rhs,
        }
    }
}

impl Div<f64> for TimeSample {
    type Output = TimeSample;

    fn div(self, rhs: f64) -> TimeSample {
        TimeSample {
            user: self.user / rhs,
            system: self.system / rhs,
            real: self.real / rhs,
        }
    }
}

impl fmt::Display for TimeSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:10.6} {:10.6} {:10.6} ({:10.6})",
            self.user,
            self.system,
            self.total(),
            self.real
        )
    }
}

/// A point-in-time reading of the wall clock and of process CPU usage.
///
/// Take one before running the code being timed and call
/// [`ClockReading::elapsed`] afterwards.
///
/// # Example
///
/// ```rust
/// use meter::ClockReading;
///
/// let start = ClockReading::now();
/// let _sum: u64 = (0..1_000u64).sum();
/// let elapsed = start.elapsed();
/// assert!(elapsed.real >= 0.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ClockReading {
    instant: Instant,
    user: f64,
    system: f64,
}

impl ClockReading {
    /// Read the clocks now.
    #[inline]
    pub fn now() -> Self {
        let (user, system) = cpu_times();
        Self {
            instant: Instant::now(),
            user,
            system,
        }
    }

    /// Time elapsed since this reading.
    #[inline]
    pub fn elapsed(&self) -> TimeSample {
        let real = self.instant.elapsed().as_secs_f64();
        let (user, system) = cpu_times();
        TimeSample {
            user: (user - self.user).max(0.0),
            system: (system - self.system).max(0.0),
            real,
        }
    }

    /// Wall-clock seconds since this reading, without touching CPU counters.
    #[inline]
    pub fn elapsed_real(&self) -> f64 {
        self.instant.elapsed().as_secs_f64()
    }
}

/// User and system CPU seconds consumed by this process so far.
#[cfg(all(unix, feature = "cpu-time"))]
fn cpu_times() -> (f64, f64) {
    use nix::sys::resource::{getrusage, UsageWho};

    match getrusage(UsageWho::RUSAGE_SELF) {
        Ok(usage) => {
            let user = usage.user_time();
            let system = usage.system_time();
            (
                user.tv_sec() as f64 + user.tv_usec() as f64 / 1_000_000.0,
                system.tv_sec() as f64 + system.tv_usec() as f64 / 1_000_000.0,
            )
        }
        Err(_) => (0.0, 0.0),
    }
}

/// CPU times are not collected without the `cpu-time` feature on unix.
#[cfg(not(all(unix, feature = "cpu-time")))]
#[inline]
fn cpu_times() -> (f64, f64) {
    (0.0, 0.0)
}
