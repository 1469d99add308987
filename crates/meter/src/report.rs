//! Report rows: percent of parent, accuracy and filtering
//!
//! The computer turns a sorted snapshot of measurements into [`ReportRow`]s.
//! Rendering those rows as text is left to [`ReportFormat`] implementations.

use crate::path::MeasurementPath;
use crate::store::Measurement;
use crate::timing::{TimeSample, TIME_CAPTION};
use serde::{Deserialize, Serialize};

/// Floor for any time used as a divisor.
pub const MIN_TOTAL_TIME: f64 = 1.0e-10;

/// Default minimum width of the count column.
pub const DEFAULT_MAX_COUNT_WIDTH: usize = 6;

/// Report computation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportOptions {
    /// Take the calibrated overhead out of every row
    pub subtract_overhead: bool,
    /// Drop rows whose accuracy is below this value
    pub filter_below_accuracy: Option<f64>,
    /// Drop rows whose percent of parent is below this value
    pub filter_below_percent: Option<f64>,
    /// Minimum width of the count column
    pub max_count_width: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            subtract_overhead: false,
            filter_below_accuracy: None,
            filter_below_percent: None,
            max_count_width: DEFAULT_MAX_COUNT_WIDTH,
        }
    }
}

impl ReportOptions {
    /// Builder method to toggle overhead subtraction.
    pub fn with_subtract_overhead(mut self, subtract: bool) -> Self {
        self.subtract_overhead = subtract;
        self
    }

    /// Builder method to drop rows below an accuracy score.
    pub fn with_filter_below_accuracy(mut self, accuracy: f64) -> Self {
        self.filter_below_accuracy = Some(accuracy);
        self
    }

    /// Builder method to drop rows below a percent of their parent.
    pub fn with_filter_below_percent(mut self, percent: f64) -> Self {
        self.filter_below_percent = Some(percent);
        self
    }

    /// Builder method to set the count column width.
    pub fn with_max_count_width(mut self, width: usize) -> Self {
        self.max_count_width = width;
        self
    }

    fn keeps(&self, row: &ReportRow) -> bool {
        if let Some(min) = self.filter_below_accuracy {
            if row.accuracy < min {
                return false;
            }
        }
        if let Some(min) = self.filter_below_percent {
            if row.percent < min {
                return false;
            }
        }
        true
    }
}

/// One computed line of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    /// Full path of the measurement
    pub path: MeasurementPath,
    /// Last path segment
    pub title: String,
    /// Nesting level below the forest root; roots are 0
    pub depth: usize,
    /// Share of the parent's real time, in percent
    pub percent: f64,
    /// Number of entries
    pub count: u64,
    /// Accumulated time, net of overhead when requested
    pub time: TimeSample,
    /// Confidence score, see [`accuracy`]
    pub accuracy: f64,
}

/// Confidence score of a measurement against a noise floor.
///
/// `log10(mean real time per entry / noise floor real time)`, with both
/// terms floored at [`MIN_TOTAL_TIME`]. Each unit is an order of magnitude
/// above the bookkeeping cost; negative values mean the measurement is
/// mostly noise.
pub fn accuracy(measurement: &Measurement, noise_floor: &TimeSample) -> f64 {
    let mean = measurement.mean().real.max(MIN_TOTAL_TIME);
    let floor = noise_floor.real.max(MIN_TOTAL_TIME);
    (mean / floor).log10()
}

/// Render an accuracy score for a text column.
pub fn format_accuracy(accuracy: f64) -> String {
    format!("{:.1}", accuracy)
}

/// Computes report rows from a measurement snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ReportComputer {
    overhead: TimeSample,
    noise_floor: TimeSample,
}

impl ReportComputer {
    /// `overhead` is taken out of rows when the options ask for it;
    /// `noise_floor` drives the accuracy score.
    pub fn new(overhead: TimeSample, noise_floor: TimeSample) -> Self {
        Self {
            overhead,
            noise_floor,
        }
    }

    fn adjusted(&self, m: &Measurement, options: &ReportOptions) -> TimeSample {
        if !options.subtract_overhead {
            return m.time;
        }
        let adjusted = m.time - self.overhead * m.count as f64;
        TimeSample::new(
            adjusted.user.max(0.0),
            adjusted.system.max(0.0),
            adjusted.real.max(0.0),
        )
    }

    /// Compute rows in path order.
    ///
    /// `measurements` must be sorted by path, as [`crate::Meter::measurements`]
    /// returns them. Filtering happens after percentages are known, so a
    /// dropped parent still serves as the reference for its children.
    pub fn compute(&self, measurements: &[Measurement], options: &ReportOptions) -> Vec<ReportRow> {
        // totals[d] is the floored real time of the latest row at depth d
        let mut totals: Vec<f64> = Vec::new();
        let mut rows = Vec::with_capacity(measurements.len());

        for m in measurements {
            let depth = m.path.depth().saturating_sub(1);
            let time = self.adjusted(m, options);

            totals.truncate(depth);
            let percent = if depth == 0 {
                if time.real > 0.0 {
                    100.0
                } else {
                    0.0
                }
            } else {
                let parent = totals.last().copied().unwrap_or(MIN_TOTAL_TIME);
                time.real * 100.0 / parent
            };
            totals.push(time.real.max(MIN_TOTAL_TIME));

            let row = ReportRow {
                path: m.path.clone(),
                title: m.path.last().to_string(),
                depth,
                percent,
                count: m.count,
                time,
                accuracy: accuracy(m, &self.noise_floor),
            };
            if options.keeps(&row) {
                rows.push(row);
            }
        }
        rows
    }
}

/// Column widths shared by every line of a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    /// Widest rendered title
    pub max_title: usize,
    /// Widest count, at least the configured minimum
    pub max_count: usize,
    /// Widest rendered accuracy
    pub max_accuracy: usize,
}

impl ReportLayout {
    /// Measure the columns of `rows` as `format` renders them.
    pub fn for_rows<F: ReportFormat + ?Sized>(
        format: &F,
        rows: &[ReportRow],
        options: &ReportOptions,
    ) -> Self {
        let mut layout = Self {
            max_title: HEADER_TITLE.len(),
            max_count: options.max_count_width.max(HEADER_COUNT.len()),
            max_accuracy: HEADER_ACCURACY.len(),
        };
        for row in rows {
            layout.max_title = layout.max_title.max(format.format_title(row).chars().count());
            layout.max_count = layout.max_count.max(row.count.to_string().len());
            layout.max_accuracy = layout.max_accuracy.max(format_accuracy(row.accuracy).len());
        }
        layout
    }
}

/// Header captions.
pub const HEADER_TITLE: &str = "measure path";
pub const HEADER_PERCENT: &str = "percent";
pub const HEADER_ACCURACY: &str = "acc";
pub const HEADER_COUNT: &str = "count";
pub const HEADER_TIME: &str = TIME_CAPTION;

/// Turns computed rows into output lines.
///
/// Implementors override the hooks; [`ReportFormat::render`] drives them.
pub trait ReportFormat {
    /// Name the format is registered under.
    fn name(&self) -> &str;

    /// Text shown for a row's path.
    fn format_title(&self, row: &ReportRow) -> String {
        row.path.to_string()
    }

    /// Line emitted before the rows.
    fn format_header(&self, _layout: &ReportLayout, _options: &ReportOptions) -> String {
        String::new()
    }

    /// Line emitted for one row.
    fn format_measure(
        &self,
        row: &ReportRow,
        title: &str,
        layout: &ReportLayout,
        options: &ReportOptions,
    ) -> String;

    /// Line emitted after the rows.
    fn format_footer(&self, _options: &ReportOptions) -> String {
        String::new()
    }

    /// Header, one line per row, footer. Empty lines are dropped and an
    /// empty row sequence renders as nothing at all.
    fn render(&self, rows: &[ReportRow], options: &ReportOptions) -> Vec<String> {
        if rows.is_empty() {
            return Vec::new();
        }
        let layout = ReportLayout::for_rows(self, rows, options);

        let mut lines = Vec::with_capacity(rows.len() + 2);
        lines.push(self.format_header(&layout, options));
        for row in rows {
            let title = self.format_title(row);
            lines.push(self.format_measure(row, &title, &layout, options));
        }
        lines.push(self.format_footer(options));
        lines.retain(|line| !line.is_empty());
        lines
    }
}
