//! Scraping of the build tool's textual output.
//!
//! The build tool gives us nothing structured to work with, so everything we
//! learn about a failed build comes from matching its log against the patterns
//! in this module. Keep them here; the retry logic only ever sees the parsed
//! results.

use std::sync::LazyLock;

use regex::Regex;

use crate::OverflowReport;

/// Linker diagnostic emitted when a memory region can't hold its contents.
pub const OVERFLOW_PATTERN: &str = r"region `(\S+)' overflowed by (\d+) bytes";

/// Emitted when the toolchain has no support for the board's architecture.
pub const ARCH_UNSUPPORTED_PATTERN: &str = r"Arch .*? not supported";

/// Per-region line of the memory usage table printed after a successful link.
pub const MEMORY_USAGE_PATTERN: &str =
    r"(?P<region>\w+){1}:\s*(?P<used>\d+\s+\w{1,2})\s*(?P<size>\d+\s+\w{1,2})\s*(?P<percentage>\d+.\d+%)";

static OVERFLOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(OVERFLOW_PATTERN).expect("overflow pattern is valid")
});
static ARCH_UNSUPPORTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(ARCH_UNSUPPORTED_PATTERN).expect("arch pattern is valid")
});
static MEMORY_USAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(MEMORY_USAGE_PATTERN).expect("memory usage pattern is valid")
});

/// Extracts every region overflow report from `output`, in the order the
/// linker printed them. Region names keep their original case.
pub fn overflow_reports(output: &str) -> Vec<OverflowReport> {
    OVERFLOW.captures_iter(output)
        .filter_map(|c| {
            let bytes = c[2].parse().ok()?;
            Some(OverflowReport {
                region: c[1].to_string(),
                bytes,
            })
        })
        .collect()
}

/// Checks whether `output` says the architecture is not supported at all.
pub fn arch_unsupported(output: &str) -> bool {
    ARCH_UNSUPPORTED.is_match(output)
}

/// One row of the linker's memory usage table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UsageLine {
    pub region: String,
    pub used: u64,
    pub size: u64,
}

/// Collects the memory usage table rows from a build log. Rows whose amounts
/// use a unit we don't know are skipped.
pub fn memory_usage(log: &str) -> Vec<UsageLine> {
    MEMORY_USAGE.captures_iter(log)
        .filter_map(|c| {
            Some(UsageLine {
                region: c["region"].to_string(),
                used: parse_amount(&c["used"])?,
                size: parse_amount(&c["size"])?,
            })
        })
        .collect()
}

/// Converts an amount like `12 KB` to bytes. Units are binary multiples.
pub fn parse_amount(text: &str) -> Option<u64> {
    let mut parts = text.split_whitespace();
    let n: u64 = parts.next()?.parse().ok()?;
    let shift = match parts.next()? {
        "B" => 0,
        "KB" => 10,
        "MB" => 20,
        "GB" => 30,
        _ => return None,
    };
    n.checked_mul(1 << shift)
}
