//! Integration tests for the report formats
//! Renders real meters through the registry

use meter::{Meter, ReportOptions};
use proptest::prelude::*;
use report_formats::{FormatRegistry, HtmlFormat, BUILTIN_FORMATS};

fn sample_meter() -> Meter {
    let meter = Meter::new();
    meter
        .measure("request", || {
            meter.measure("decode", || {}).unwrap();
            for i in 0..4 {
                meter.measure_result("cached", || i < 3).unwrap();
            }
        })
        .unwrap();
    meter
}

#[test]
fn test_simple_report_layout() {
    let meter = sample_meter();
    let lines = FormatRegistry::with_builtin()
        .report(&meter, "simple", &ReportOptions::default())
        .unwrap();

    // header + blocks + request + decode + two outcome rows
    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with("measure path"));
    assert!(lines[1].starts_with("\\blocks"));
    assert!(lines[2].starts_with("    \\request"));
    assert!(lines[3].starts_with("        \\cached = \"false\""));
    assert!(lines[4].starts_with("        \\cached = \"true\""));
    assert!(lines[5].starts_with("        \\decode"));
}

#[test]
fn test_list_of_measures_counts() {
    let meter = sample_meter();
    let lines = FormatRegistry::with_builtin()
        .report(&meter, "list_of_measures", &ReportOptions::default())
        .unwrap();
    assert_eq!(
        lines,
        vec![
            "\\blocks,0",
            "\\blocks\\request,1",
            "\\blocks\\request\\cached = \"false\",1",
            "\\blocks\\request\\cached = \"true\",3",
            "\\blocks\\request\\decode,1",
        ]
    );
}

#[test]
fn test_html_escapes_outcomes() {
    let meter = sample_meter();
    let lines = FormatRegistry::with_builtin()
        .report(&meter, "html", &ReportOptions::default())
        .unwrap();
    assert!(lines.iter().any(|l| l.contains("\\cached = &quot;true&quot;")));
    assert!(lines.iter().all(|l| !l.contains("\"true\"")));
}

#[test]
fn test_csv_and_json_cover_every_row() {
    let meter = sample_meter();
    let registry = FormatRegistry::with_builtin();
    let options = ReportOptions::default();
    let rows = meter.compute_rows(&options);

    let csv = registry.render("csv", &rows, &options).unwrap();
    assert_eq!(csv.len(), rows.len() + 1);

    let json = registry.render("json", &rows, &options).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json[0]).unwrap();
    assert_eq!(value["rows"].as_array().map(Vec::len), Some(rows.len()));
}

#[test]
fn test_custom_format_registration() {
    let mut registry = FormatRegistry::new();
    registry.register(HtmlFormat);
    assert_eq!(registry.names(), vec!["html"]);
    assert!(registry.get("simple").is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_every_format_renders_every_tree(labels in prop::collection::vec("[a-z]{1,6}", 1..6)) {
        let meter = Meter::new();
        for label in &labels {
            meter.measure(label, || ()).unwrap();
        }
        let registry = FormatRegistry::with_builtin();
        let rows = meter.compute_rows(&ReportOptions::default());
        for name in BUILTIN_FORMATS {
            let lines = registry.render(name, &rows, &ReportOptions::default()).unwrap();
            prop_assert!(!lines.is_empty());
        }
    }
}
