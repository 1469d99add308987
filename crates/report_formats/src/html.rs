//! HTML table report

use meter::report::HEADER_TITLE;
use meter::{format_accuracy, ReportFormat, ReportLayout, ReportOptions, ReportRow, PATH_DELIMITER};

/// Indentation per level below the forest root.
const INDENT: &str = "&nbsp;&nbsp;&nbsp;";

/// CSS class of the generated table.
pub const TABLE_CLASS: &str = "meter_report_table";

/// HTML table formatter
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFormat;

impl HtmlFormat {
    /// Escape HTML special characters.
    pub fn escape_html(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;")
    }
}

impl ReportFormat for HtmlFormat {
    fn name(&self) -> &str {
        "html"
    }

    fn format_title(&self, row: &ReportRow) -> String {
        format!(
            "{}{}{}",
            INDENT.repeat(row.depth),
            PATH_DELIMITER,
            Self::escape_html(&row.title)
        )
    }

    fn format_header(&self, _layout: &ReportLayout, _options: &ReportOptions) -> String {
        format!(
            "<table class='{}'><tr><th>{}</th><th>%</th><th>acc</th><th>count</th>\
             <th>user</th><th>system</th><th>total</th><th>real</th></tr>",
            TABLE_CLASS, HEADER_TITLE
        )
    }

    fn format_measure(
        &self,
        row: &ReportRow,
        title: &str,
        _layout: &ReportLayout,
        _options: &ReportOptions,
    ) -> String {
        format!(
            "<tr><td>{}</td><td>{:.3}</td><td>{}</td><td>{}</td>\
             <td>{:.6}</td><td>{:.6}</td><td>{:.6}</td><td>{:.6}</td></tr>",
            title,
            row.percent,
            format_accuracy(row.accuracy),
            row.count,
            row.time.user,
            row.time.system,
            row.time.total(),
            row.time.real
        )
    }

    fn format_footer(&self, _options: &ReportOptions) -> String {
        "</table>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter::{MeasurementPath, TimeSample};

    fn row(path: &str) -> ReportRow {
        let path: MeasurementPath = path.parse().unwrap();
        ReportRow {
            title: path.last().to_string(),
            depth: path.depth() - 1,
            path,
            percent: 12.5,
            count: 2,
            time: TimeSample::new(0.25, 0.125, 0.5),
            accuracy: 1.5,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            HtmlFormat::escape_html("x = \"<b>&'\""),
            "x = &quot;&lt;b&gt;&amp;&#39;&quot;"
        );
    }

    #[test]
    fn test_table_structure() {
        let rows = vec![row("\\blocks"), row("\\blocks\\flag = \"true\"")];
        let lines = HtmlFormat.render(&rows, &ReportOptions::default());

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("<table class='meter_report_table'>"));
        assert_eq!(lines[3], "</table>");
        assert_eq!(
            lines[2],
            "<tr><td>&nbsp;&nbsp;&nbsp;\\flag = &quot;true&quot;</td><td>12.500</td><td>1.5</td>\
             <td>2</td><td>0.250000</td><td>0.125000</td><td>0.375000</td><td>0.500000</td></tr>"
        );
    }
}
