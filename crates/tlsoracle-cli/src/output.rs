use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};

use tlsoracle_core::ProbeVerdict;
use tlsoracle_core::report::LeakTestReport;

/// Create a styled table for output
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

/// Verdict cell, colored by severity
pub fn verdict_cell(verdict: Option<ProbeVerdict>) -> Cell {
    match verdict {
        Some(ProbeVerdict::True) => Cell::new("TRUE").fg(Color::Red),
        Some(ProbeVerdict::False) => Cell::new("FALSE").fg(Color::Green),
        Some(verdict) => Cell::new(verdict.as_str()).fg(Color::Yellow),
        None => Cell::new("-"),
    }
}

/// Compact flag column: distinct / shaky / erroneous / significant
pub fn format_flags(test: &LeakTestReport) -> String {
    let flags: Vec<&str> = [
        (test.distinct_answers, "distinct"),
        (test.shaky, "shaky"),
        (test.erroneous, "erroneous"),
        (test.significant, "significant"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();
    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.join(", ")
    }
}
