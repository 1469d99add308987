//! JSON report for machine consumption

use meter::{MeterResult, ReportFormat, ReportLayout, ReportOptions, ReportRow};
use serde::Serialize;

/// JSON document wrapping the rows
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport<'a> {
    pub options: &'a ReportOptions,
    pub rows: &'a [ReportRow],
}

/// JSON formatter, renders the whole report as a single line
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat {
    pretty: bool,
}

impl JsonFormat {
    /// Create a formatter producing compact JSON.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to produce indented JSON.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Serialize rows and options into one document.
    pub fn to_json(&self, rows: &[ReportRow], options: &ReportOptions) -> MeterResult<String> {
        let report = JsonReport { options, rows };
        let json = if self.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        Ok(json)
    }
}

impl ReportFormat for JsonFormat {
    fn name(&self) -> &str {
        "json"
    }

    fn format_measure(
        &self,
        row: &ReportRow,
        _title: &str,
        _layout: &ReportLayout,
        _options: &ReportOptions,
    ) -> String {
        serde_json::to_string(row).unwrap_or_default()
    }

    fn render(&self, rows: &[ReportRow], options: &ReportOptions) -> Vec<String> {
        if rows.is_empty() {
            return Vec::new();
        }
        match self.to_json(rows, options) {
            Ok(json) => vec![json],
            Err(err) => {
                tracing::error!(target: "report_formats::json", error = %err, "failed to serialize report");
                Vec::new()
            }
        }
    }
}
