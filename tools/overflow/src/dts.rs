//! Lookup of memory region nodes in a flattened device-tree source.
//!
//! We don't parse device-tree. We look for two things by pattern: the
//! `zephyr,<name> = &<label>;` entry in the chosen node, which tells us which
//! node backs a memory, and that node's `reg = <...>;` property.

use std::path::{Path, PathBuf};

use regex::Regex;

/// Names used by linker diagnostics that don't match a chosen-node entry,
/// mapped to the entry that usually describes the same memory.
pub const NODE_ALIASES: &[(&str, &str)] = &[
    ("ram", "sram"),
    ("rom", "flash"),
    ("dram0_1_seg", "ipmmem0"),
    ("iccm", "iccm0"),
    ("dccm", "dccm0"),
];

/// A memory node with a known location and size.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedNode {
    /// Label of the node in the device tree, used to address it in overlays.
    pub node: String,
    /// Base address cell as written, passed through to overlays untouched.
    pub base: String,
    pub size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no node {name} found when trying to resize it")]
    NoNode {
        name: String,
    },
    #[error("unable to parse enough information out of node {node} to increase its size")]
    NoSize {
        node: String,
    },
    #[error("can't read device tree at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Finds the node chosen as `zephyr,<name>` and returns its label along with
/// the raw cells of its `reg` property.
///
/// Returns `None` if either the chosen entry or the `reg` property is missing.
pub fn find_node(name: &str, dts: &str) -> Option<(String, Vec<String>)> {
    let chosen = Regex::new(&format!(r"zephyr,{} = &(\w+);", regex::escape(name))).ok()?;
    let label = chosen.captures(dts)?[1].to_string();

    let reg = Regex::new(&format!(r"{}:(.*\n)*?.*reg = <(.*)>;", regex::escape(&label))).ok()?;
    let cells = reg.captures(dts)?[2]
        .split_whitespace()
        .map(str::to_string)
        .collect();

    Some((label, cells))
}

/// Like [`find_node`], but takes the last two `reg` cells as base and size.
///
/// Only the size is decoded. A node whose `reg` has fewer than two cells, or
/// whose size cell isn't a number, is reported as [`ResolveError::NoSize`].
pub fn decode_node(name: &str, dts: &str) -> Result<ResolvedNode, ResolveError> {
    let Some((node, cells)) = find_node(name, dts) else {
        return Err(ResolveError::NoNode { name: name.to_string() });
    };

    let [.., base, size] = cells.as_slice() else {
        return Err(ResolveError::NoSize { node });
    };
    match parse_cell(size) {
        Some(size) => Ok(ResolvedNode { node, base: base.clone(), size }),
        None => Err(ResolveError::NoSize { node }),
    }
}

/// Picks the chosen-node name to look up for a linker region name.
///
/// A name that already has a chosen entry is returned as-is (lowercased);
/// the alias table is only consulted when the direct lookup fails.
pub fn alternative_name(region: &str, dts: &str) -> String {
    let region = region.to_ascii_lowercase();
    if find_node(&region, dts).is_some() {
        return region;
    }
    NODE_ALIASES.iter()
        .find(|(from, _)| *from == region)
        .map(|(_, to)| to.to_string())
        .unwrap_or(region)
}

/// Resolves a linker region name against device-tree source text.
pub fn resolve_region_in(region: &str, dts: &str) -> Result<ResolvedNode, ResolveError> {
    decode_node(&alternative_name(region, dts), dts)
}

/// Resolves a linker region name against a device-tree source file.
///
/// The file is read on every call; nothing is cached.
pub fn resolve_region(region: &str, dts_path: &Path) -> Result<ResolvedNode, ResolveError> {
    let dts = std::fs::read_to_string(dts_path)
        .map_err(|source| ResolveError::Io {
            path: dts_path.to_path_buf(),
            source,
        })?;
    resolve_region_in(region, &dts)
}

/// Size cells are written in hex. Accept them with or without the prefix.
fn parse_cell(cell: &str) -> Option<u64> {
    let digits = cell.strip_prefix("0x")
        .or_else(|| cell.strip_prefix("0X"))
        .unwrap_or(cell);
    u64::from_str_radix(digits, 16).ok()
}
