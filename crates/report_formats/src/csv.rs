//! CSV report for spreadsheets and scripts

use meter::{ReportFormat, ReportLayout, ReportOptions, ReportRow};

/// Column names, in output order.
pub const CSV_COLUMNS: [&str; 9] = [
    "path", "depth", "percent", "count", "user", "system", "total", "real", "accuracy",
];

/// CSV formatter
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormat;

impl CsvFormat {
    /// Escape CSV field (handle commas, quotes, newlines)
    pub fn escape_field(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

impl ReportFormat for CsvFormat {
    fn name(&self) -> &str {
        "csv"
    }

    fn format_header(&self, _layout: &ReportLayout, _options: &ReportOptions) -> String {
        CSV_COLUMNS.join(",")
    }

    fn format_measure(
        &self,
        row: &ReportRow,
        title: &str,
        _layout: &ReportLayout,
        _options: &ReportOptions,
    ) -> String {
        let fields = [
            Self::escape_field(title),
            row.depth.to_string(),
            format!("{:.3}", row.percent),
            row.count.to_string(),
            format!("{:.6}", row.time.user),
            format!("{:.6}", row.time.system),
            format!("{:.6}", row.time.total()),
            format!("{:.6}", row.time.real),
            format!("{:.3}", row.accuracy),
        ];
        fields.join(",")
    }
}
