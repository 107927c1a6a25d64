//! Progress output. Everything here goes to stdout, interleaved with whatever
//! the build tool prints.

use comfy_table::{presets, modifiers, CellAlignment, ContentArrangement, Table};
use indexmap::IndexMap;
use size::Size;

use crate::result::MemoryUsage;

/// Prints key/value pairs in a framed two-column table.
pub fn simple_table<'a>(content: impl IntoIterator<Item = (&'a str, &'a str)>) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.apply_modifier(modifiers::UTF8_SOLID_INNER_BORDERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    for row in content {
        table.add_row([row.0, row.1]);
    }

    println!();
    println!("{table}");
    println!();
}

/// Prints a single framed line marking a phase of the build.
pub fn banner(content: impl core::fmt::Display) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row([content]);

    println!();
    println!("{table}");
    println!();
}

/// Job boundary marker for CI logs, where many builds share one output.
pub fn frame(content: impl core::fmt::Display) {
    let rule = "=".repeat(80);
    println!();
    println!("{rule}");
    println!("{content}");
    println!("{rule}");
    println!();
}

pub fn memory_table(usage: &IndexMap<String, MemoryUsage>) {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(["REGION", "USED", "SIZE"]);
    for (region, u) in usage {
        table.add_row([
            region.clone(),
            Size::from_bytes(u.used).to_string(),
            Size::from_bytes(u.size).to_string(),
        ]);
    }
    for col in 1..3 {
        if let Some(c) = table.column_mut(col) {
            c.set_cell_alignment(CellAlignment::Right);
        }
    }
    println!("{table}");
    println!();
}
