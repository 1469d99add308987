//! `path,count` listing, mostly useful for asserting on call trees in tests

use meter::{ReportFormat, ReportLayout, ReportOptions, ReportRow};

/// One `path,count` line per row, no header or footer
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOfMeasuresFormat;

impl ReportFormat for ListOfMeasuresFormat {
    fn name(&self) -> &str {
        "list_of_measures"
    }

    fn format_measure(
        &self,
        row: &ReportRow,
        title: &str,
        _layout: &ReportLayout,
        _options: &ReportOptions,
    ) -> String {
        format!("{},{}", title, row.count)
    }
}
