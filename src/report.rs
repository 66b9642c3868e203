//! Human and machine readable output of a run.

use crate::decision::{Status, Summary};
use crate::display_time;
use crate::monitor::SiteReport;
use comfy_table::presets::ASCII_MARKDOWN;
use comfy_table::{Cell, CellAlignment, Table};
use strum::IntoEnumIterator;

/// Per-site table: SITENAME, PORT, STATUS, EXPIRES, DAYS LEFT.
pub fn render_table(reports: &[SiteReport]) -> String {
    let mut table = Table::new();
    table
        .load_preset(ASCII_MARKDOWN)
        .set_header(vec!["SITENAME", "PORT", "STATUS", "EXPIRES", "DAYS LEFT"]);

    for report in reports {
        table.add_row(vec![
            Cell::new(&report.site),
            Cell::new(report.port),
            Cell::new(report.status),
            Cell::new(
                report
                    .not_after
                    .map(display_time)
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                report
                    .days_left
                    .map(|days| days.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            )
            .set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

/// The `Summary:` block, listing only statuses that occurred.
pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::from("Summary:\n");
    for status in Status::iter() {
        let count = summary.count(status);
        if count > 0 {
            out.push_str(&format!("  {:12}: {}\n", status.to_string(), count));
        }
    }
    out
}

/// All four counts as a JSON object, in display order.
pub fn render_json(summary: &Summary) -> Result<String, serde_json::Error> {
    serde_json::to_string(summary)
}
