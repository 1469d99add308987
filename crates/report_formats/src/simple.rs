//! Aligned plain-text report
//!
//! ```text
//! measure path      : percent%  acc  count       user     system      total        real
//! \blocks           : 100.000%  2.1      0   0.010000   0.000000   0.010000 (  0.052103)
//!     \load         :  96.020%  3.7      1   0.010000   0.000000   0.010000 (  0.050029)
//!         \parse    :  40.112%  2.9     10   0.000000   0.000000   0.000000 (  0.020068)
//! ```
//!
//! `percent` is the share of the real time of the enclosing path. Siblings
//! add up to at most 100%; the rest is time nobody measured.

use meter::report::{HEADER_ACCURACY, HEADER_COUNT, HEADER_PERCENT, HEADER_TIME, HEADER_TITLE};
use meter::{format_accuracy, ReportFormat, ReportLayout, ReportOptions, ReportRow, PATH_DELIMITER};

/// Indentation per level below the forest root.
pub const DEFAULT_INDENT: &str = "    ";

/// Padding between the widest title and the colon.
const EXTRA_SPACES_AFTER_TITLE: usize = 2;

/// Plain-text formatter
#[derive(Debug, Clone)]
pub struct SimpleFormat {
    indent: String,
}

impl Default for SimpleFormat {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT.to_string(),
        }
    }
}

impl SimpleFormat {
    /// Create a formatter with the default indentation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to change the indentation unit.
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    fn line(
        &self,
        title: &str,
        percent: &str,
        accuracy: &str,
        count: &str,
        time: &str,
        layout: &ReportLayout,
    ) -> String {
        format!(
            "{:<title_w$}: {:>7}% {:>acc_w$} {:>count_w$} {}",
            title,
            percent,
            accuracy,
            count,
            time,
            title_w = layout.max_title + EXTRA_SPACES_AFTER_TITLE,
            acc_w = layout.max_accuracy,
            count_w = layout.max_count,
        )
    }
}

impl ReportFormat for SimpleFormat {
    fn name(&self) -> &str {
        "simple"
    }

    fn format_title(&self, row: &ReportRow) -> String {
        format!("{}{}{}", self.indent.repeat(row.depth), PATH_DELIMITER, row.title)
    }

    fn format_header(&self, layout: &ReportLayout, _options: &ReportOptions) -> String {
        self.line(
            HEADER_TITLE,
            HEADER_PERCENT,
            HEADER_ACCURACY,
            HEADER_COUNT,
            HEADER_TIME,
            layout,
        )
    }

    fn format_measure(
        &self,
        row: &ReportRow,
        title: &str,
        layout: &ReportLayout,
        _options: &ReportOptions,
    ) -> String {
        self.line(
            title,
            &format!("{:.3}", row.percent),
            &format_accuracy(row.accuracy),
            &row.count.to_string(),
            &row.time.to_string(),
            layout,
        )
    }
}
