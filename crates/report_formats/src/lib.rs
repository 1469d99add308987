//! Report Formats
//!
//! Renderers for the rows computed by [`meter::Meter::compute_rows`], and a
//! registry that looks them up by name:
//!
//! - `simple` - aligned plain text with indented titles
//! - `html` - an HTML table
//! - `list_of_measures` - `path,count` lines
//! - `csv` - comma separated values with a header
//! - `json` - a single JSON document
//!
//! # Example
//!
//! ```rust
//! use meter::{Meter, ReportOptions};
//! use report_formats::FormatRegistry;
//!
//! let meter = Meter::new();
//! meter.measure("startup", || {}).unwrap();
//!
//! let formats = FormatRegistry::with_builtin();
//! let lines = formats
//!     .report(&meter, "list_of_measures", &ReportOptions::default())
//!     .unwrap();
//! assert_eq!(lines, ["\\blocks,0", "\\blocks\\startup,1"]);
//! ```

mod csv;
mod html;
mod json;
mod list;
mod simple;

pub use csv::{CsvFormat, CSV_COLUMNS};
pub use html::{HtmlFormat, TABLE_CLASS};
pub use json::{JsonFormat, JsonReport};
pub use list::ListOfMeasuresFormat;
pub use simple::{SimpleFormat, DEFAULT_INDENT};

use meter::{Meter, MeterError, MeterResult, ReportFormat, ReportOptions, ReportRow};
use std::collections::BTreeMap;

/// Names of the built-in formats.
pub const BUILTIN_FORMATS: [&str; 5] = ["simple", "html", "list_of_measures", "csv", "json"];

/// Formatters keyed by name
#[derive(Default)]
pub struct FormatRegistry {
    formats: BTreeMap<String, Box<dyn ReportFormat>>,
}

impl FormatRegistry {
    /// Create a registry with no formats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in format.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SimpleFormat::new());
        registry.register(HtmlFormat);
        registry.register(ListOfMeasuresFormat);
        registry.register(CsvFormat);
        registry.register(JsonFormat::new());
        registry
    }

    /// Add a format under its own name, replacing any format with that name.
    pub fn register<F: ReportFormat + 'static>(&mut self, format: F) {
        let name = format.name().to_string();
        tracing::debug!(target: "report_formats", name = name.as_str(), "format registered");
        self.formats.insert(name, Box::new(format));
    }

    /// The format registered under `name`.
    pub fn get(&self, name: &str) -> MeterResult<&dyn ReportFormat> {
        self.formats
            .get(name)
            .map(|format| format.as_ref())
            .ok_or_else(|| MeterError::UnknownFormat(name.to_string()))
    }

    /// True when a format is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.formats.keys().map(String::as_str).collect()
    }

    /// Render precomputed rows with the format called `name`.
    pub fn render(
        &self,
        name: &str,
        rows: &[ReportRow],
        options: &ReportOptions,
    ) -> MeterResult<Vec<String>> {
        Ok(self.get(name)?.render(rows, options))
    }

    /// Compute rows from `meter` and render them with the format called
    /// `name`.
    pub fn report(
        &self,
        meter: &Meter,
        name: &str,
        options: &ReportOptions,
    ) -> MeterResult<Vec<String>> {
        let format = self.get(name)?;
        Ok(meter.report(format, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = FormatRegistry::with_builtin();
        let mut expected = BUILTIN_FORMATS.to_vec();
        expected.sort();
        assert_eq!(registry.names(), expected);
        for name in BUILTIN_FORMATS {
            assert_eq!(registry.get(name).unwrap().name(), name);
        }
    }

    #[test]
    fn test_unknown_format() {
        let registry = FormatRegistry::with_builtin();
        assert!(matches!(
            registry.render("xml", &[], &ReportOptions::default()),
            Err(MeterError::UnknownFormat(name)) if name == "xml"
        ));
        assert!(!FormatRegistry::new().contains("simple"));
    }

    #[test]
    fn test_empty_rows_render_empty_everywhere() {
        let registry = FormatRegistry::with_builtin();
        for name in BUILTIN_FORMATS {
            assert!(registry
                .render(name, &[], &ReportOptions::default())
                .unwrap()
                .is_empty());
        }
    }
}
